// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::errors::{RouterError, RouterResult};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Serves one accepted connection. The token is cancelled on shutdown.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken);
}

/// Accept loop that hands every connection to a [`ConnectionHandler`] on its
/// own task and, on shutdown, waits for all of them before returning.
pub struct TcpServer {
    addr: String,
    listener: Mutex<Option<TcpListener>>,
    handler: StdMutex<Option<Arc<dyn ConnectionHandler>>>,
    started: watch::Sender<Option<SocketAddr>>,
    tracker: TaskTracker,
}

impl TcpServer {
    pub fn new(addr: impl Into<String>) -> Self {
        let (started, _) = watch::channel(None);
        Self {
            addr: addr.into(),
            listener: Mutex::new(None),
            handler: StdMutex::new(None),
            started,
            tracker: TaskTracker::new(),
        }
    }

    /// Binds the listening socket. Calling it again returns the bound address.
    pub async fn listen(&self) -> RouterResult<SocketAddr> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref() {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(&self.addr).await?;
        let local = listener.local_addr()?;
        *slot = Some(listener);

        info!("Listening for connections on {}", local);
        self.started.send_replace(Some(local));
        Ok(local)
    }

    pub fn set_handler(&self, handler: Arc<dyn ConnectionHandler>) {
        let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handler);
    }

    /// Yields the bound address once the server is listening.
    pub fn started(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.started.subscribe()
    }

    pub fn active_connections(&self) -> usize {
        self.tracker.len()
    }

    /// Accepts until `cancel` fires, then drops the listener, waits for every
    /// in-flight handler and returns [`RouterError::ListenerClosed`].
    pub async fn run(&self, cancel: CancellationToken) -> RouterResult<()> {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(RouterError::NoHandler)?;

        self.listen().await?;
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(RouterError::ListenerClosed)?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let handler = handler.clone();
                        let token = cancel.child_token();
                        self.tracker.spawn(async move {
                            handler.handle(stream, peer, token).await;
                            debug!("Connection from {} closed", peer);
                        });
                    }
                    Err(e) => {
                        let err = RouterError::TransientAcceptError(e);
                        warn!("{}", err);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        self.started.send_replace(None);

        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!("Waiting for {} connections to finish", in_flight);
        }
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();

        info!("Listener closed");
        Err(RouterError::ListenerClosed)
    }
}
