// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fixtures: an in-memory chain wired to the registries, plus a TCP echo provider.
#![allow(dead_code)]

use ethers::types::{Address, H160, U256};
use ethers::utils::keccak256;
use proxy_router::contracts::{ContractBackend, MockChain, TxIssuer};
use proxy_router::errors::RouterResult;
use proxy_router::proxy::{ForwarderConfig, SessionForwarder};
use proxy_router::registries::{MarketplaceRegistry, MorTokenRegistry};
use proxy_router::session::{SessionConfig, SessionManager};
use proxy_router::transport::TcpServer;
use proxy_router::utils::Hash;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const ROUTER: Address = H160([0x0a; 20]);
pub const MARKETPLACE: Address = H160([0xd1; 20]);
pub const TOKEN: Address = H160([0x70; 20]);
pub const PROVIDER: Address = H160([0x9e; 20]);

pub struct Harness {
    pub chain: Arc<MockChain>,
    pub issuer: Arc<TxIssuer>,
    pub marketplace: Arc<MarketplaceRegistry>,
    pub token: MorTokenRegistry,
}

pub fn harness() -> Harness {
    harness_with(Duration::ZERO, Duration::from_secs(5))
}

pub fn harness_with(inclusion_delay: Duration, inclusion_timeout: Duration) -> Harness {
    let chain = Arc::new(MockChain::new(ROUTER, MARKETPLACE, TOKEN).with_inclusion_delay(inclusion_delay));
    let backend: Arc<dyn ContractBackend> = chain.clone();
    let issuer = Arc::new(TxIssuer::new(backend, inclusion_timeout));

    Harness {
        marketplace: Arc::new(MarketplaceRegistry::new(MARKETPLACE, issuer.clone())),
        token: MorTokenRegistry::new(TOKEN, issuer.clone()),
        issuer,
        chain,
    }
}

impl Harness {
    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            self.marketplace.clone(),
            SessionConfig::default(),
        ))
    }

    /// Registers `PROVIDER` at `endpoint` and the named model, then posts a bid.
    pub async fn provider_with_bid(&self, endpoint: &str, model: &str, price: u64) -> (Hash, Hash) {
        let model_id = model_id(model);
        self.chain
            .register_provider(PROVIDER, endpoint, U256::from(1_000u64))
            .await;
        self.chain
            .register_model(model_id, model, PROVIDER, U256::from(100u64))
            .await;

        let bid_id = self
            .marketplace
            .post_bid(PROVIDER, model_id, U256::from(price))
            .await
            .unwrap();
        (model_id, bid_id)
    }
}

pub fn model_id(name: &str) -> Hash {
    Hash::new(keccak256(name.as_bytes()))
}

/// Provider stand-in that echoes every byte back until the peer closes.
pub async fn spawn_echo_provider() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Provider stand-in that accepts connections and never answers.
pub async fn spawn_silent_provider() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// Provider stand-in that reads the whole request, then answers with `chunks`,
/// pausing `gap` between them.
pub async fn spawn_chunked_provider(chunks: Vec<&'static str>, gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let chunks = chunks.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                if stream.read_to_end(&mut request).await.is_err() {
                    return;
                }
                for chunk in chunks {
                    if stream.write_all(chunk.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = stream.flush().await;
                    tokio::time::sleep(gap).await;
                }
            });
        }
    });

    addr
}

pub struct RunningRouter {
    pub addr: SocketAddr,
    pub server: Arc<TcpServer>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<RouterResult<()>>,
}

/// Starts the dispatcher on an ephemeral port with a forwarder for `sessions`.
pub async fn start_router(sessions: Arc<SessionManager>, config: ForwarderConfig) -> RunningRouter {
    let server = Arc::new(TcpServer::new("127.0.0.1:0"));
    server.set_handler(Arc::new(SessionForwarder::new(sessions, config)));
    let addr = server.listen().await.unwrap();

    let cancel = CancellationToken::new();
    let task = {
        let server = server.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { server.run(cancel).await })
    };

    RunningRouter {
        addr,
        server,
        cancel,
        task,
    }
}
