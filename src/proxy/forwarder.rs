// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{copy_bidirectional, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handshake::read_session_id;
use super::streaming::ChunkSink;
use crate::errors::{RouterError, RouterResult};
use crate::session::{ResolvedSession, SessionManager};
use crate::transport::ConnectionHandler;
use crate::utils::hash::Hash;

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub handshake_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Accepted,
    Bound,
    Relaying,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Bound => "bound",
            ConnectionState::Relaying => "relaying",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Both sides reached EOF.
    Completed,
    SessionClosed,
    Expired,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub session_id: Hash,
    /// Byte counts are only known for relays that ran to completion.
    pub to_provider: u64,
    pub to_consumer: u64,
    pub end: RelayEnd,
}

/// Runs `step` unless `cancel` fires first.
async fn unless_cancelled<F, T>(cancel: &CancellationToken, step: F) -> RouterResult<T>
where
    F: Future<Output = RouterResult<T>>,
{
    tokio::select! {
        out = step => out,
        _ = cancel.cancelled() => Err(RouterError::Cancelled),
    }
}

/// Resolves once the session closes, its deadline passes or `cancel` fires.
async fn session_ended(resolved: &ResolvedSession, cancel: &CancellationToken) -> RelayEnd {
    tokio::select! {
        _ = resolved.closed.cancelled() => RelayEnd::SessionClosed,
        _ = sleep_until(Instant::now() + resolved.time_remaining()) => RelayEnd::Expired,
        _ = cancel.cancelled() => RelayEnd::Shutdown,
    }
}

/// Binds inbound connections to their session and relays bytes to the
/// session's provider for as long as the session stays open.
pub struct SessionForwarder {
    sessions: Arc<SessionManager>,
    config: ForwarderConfig,
}

impl SessionForwarder {
    pub fn new(sessions: Arc<SessionManager>, config: ForwarderConfig) -> Self {
        Self { sessions, config }
    }

    async fn connect(&self, resolved: &ResolvedSession) -> RouterResult<TcpStream> {
        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(resolved.endpoint.as_str()),
        )
        .await
        .map_err(|_| {
            RouterError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to provider {} timed out", resolved.endpoint),
            ))
        })??;

        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Reads the handshake from `inbound`, then relays in both directions.
    /// Any failure before relaying starts closes the inbound connection
    /// without forwarding a byte.
    pub async fn relay(
        &self,
        inbound: TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> RouterResult<RelayStats> {
        debug!("Connection {} {}", peer, ConnectionState::Accepted);
        let mut inbound = BufReader::new(inbound);

        let handshake = async {
            timeout(self.config.handshake_timeout, read_session_id(&mut inbound))
                .await
                .map_err(|_| RouterError::InvalidArgument("handshake timed out".to_string()))?
        };
        let session_id = unless_cancelled(&cancel, handshake).await?;

        let resolved =
            unless_cancelled(&cancel, self.sessions.resolve_session(session_id)).await?;
        debug!(
            "Connection {} {} to session {}",
            peer,
            ConnectionState::Bound,
            session_id
        );

        let mut outbound = tokio::select! {
            connected = self.connect(&resolved) => connected?,
            end = session_ended(&resolved, &cancel) => {
                debug!("Connection {} dropped before relaying ({:?})", peer, end);
                return Ok(RelayStats {
                    session_id,
                    to_provider: 0,
                    to_consumer: 0,
                    end,
                });
            }
        };
        debug!(
            "Connection {} {} to {}",
            peer,
            ConnectionState::Relaying,
            resolved.endpoint
        );

        let outcome = tokio::select! {
            copied = copy_bidirectional(&mut inbound, &mut outbound) => {
                copied.map(|(to_provider, to_consumer)| (to_provider, to_consumer, RelayEnd::Completed))
            }
            end = session_ended(&resolved, &cancel) => Ok((0, 0, end)),
        };

        let _ = inbound.get_mut().shutdown().await;
        let _ = outbound.shutdown().await;
        debug!("Connection {} {}", peer, ConnectionState::Closed);

        let (to_provider, to_consumer, end) = outcome?;
        Ok(RelayStats {
            session_id,
            to_provider,
            to_consumer,
            end,
        })
    }

    /// Sends `request` to the session's provider, half-closes the write side,
    /// and delivers the response to `sink` chunk by chunk. Returns the number
    /// of bytes delivered.
    pub async fn forward_streaming<S>(
        &self,
        session_id: Hash,
        request: Bytes,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> RouterResult<u64>
    where
        S: ChunkSink + ?Sized,
    {
        let resolved =
            unless_cancelled(&cancel, self.sessions.resolve_session(session_id)).await?;

        let send_request = async {
            let stream = self.connect(&resolved).await?;
            let (read_half, mut write_half) = stream.into_split();
            write_half.write_all(&request).await?;
            write_half.shutdown().await?;
            Ok::<_, RouterError>(read_half)
        };
        let read_half = tokio::select! {
            sent = send_request => sent?,
            end = session_ended(&resolved, &cancel) => {
                debug!("Streaming for session {} stopped before the response ({:?})", session_id, end);
                return Ok(0);
            }
        };

        let mut frames = FramedRead::new(read_half, BytesCodec::new());
        let ended = session_ended(&resolved, &cancel);
        tokio::pin!(ended);

        let mut delivered = 0u64;
        loop {
            tokio::select! {
                end = &mut ended => {
                    debug!("Streaming for session {} stopped ({:?})", session_id, end);
                    break;
                }
                frame = frames.next() => match frame {
                    Some(Ok(chunk)) => {
                        let len = chunk.len() as u64;
                        tokio::select! {
                            sent = sink.send_chunk(chunk.freeze()) => {
                                sent?;
                                delivered += len;
                            }
                            end = &mut ended => {
                                debug!("Streaming for session {} stopped ({:?})", session_id, end);
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }

        Ok(delivered)
    }
}

#[async_trait]
impl ConnectionHandler for SessionForwarder {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) {
        match self.relay(stream, peer, cancel).await {
            Ok(stats) => info!(
                "Relay for session {} from {} ended ({:?}): {} bytes up, {} bytes down",
                stats.session_id, peer, stats.end, stats.to_provider, stats.to_consumer
            ),
            Err(RouterError::Cancelled) => debug!("Connection from {} dropped on shutdown", peer),
            Err(e) => warn!("Connection from {} rejected: {}", peer, e),
        }
    }
}
