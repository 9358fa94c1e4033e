// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use proxy_router::{
    config::RouterConfig,
    contracts::{ContractBackend, EthersBackend, TxIssuer},
    proxy::SessionForwarder,
    registries::{MarketplaceRegistry, MorTokenRegistry},
    session::SessionManager,
    transport::TcpServer,
    version,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting {}", version::get_version_string());

    let config = RouterConfig::parse();
    let chain = config.chain().context("invalid chain configuration")?;

    let backend = EthersBackend::connect(&chain, &config.wallet_private_key)
        .await
        .context("failed to connect to chain")?;
    let account = backend.default_account();
    let backend: Arc<dyn ContractBackend> = Arc::new(backend);

    let issuer = Arc::new(TxIssuer::new(backend, config.inclusion_timeout()));
    let marketplace = Arc::new(MarketplaceRegistry::new(
        chain.contracts.marketplace,
        issuer.clone(),
    ));
    let token = MorTokenRegistry::new(chain.contracts.mor_token, issuer.clone());

    match token.get_balance(account).await {
        Ok(balance) => info!("Account {:?} holds {} staking tokens", account, balance),
        Err(e) => warn!("Could not read staking token balance: {}", e),
    }

    let shutdown = CancellationToken::new();

    let sessions = Arc::new(SessionManager::new(marketplace, config.session()));
    let reconciler = sessions.spawn_reconciler(shutdown.child_token());

    let server = Arc::new(TcpServer::new(config.proxy_address.clone()));
    server.set_handler(Arc::new(SessionForwarder::new(
        sessions.clone(),
        config.forwarder(),
    )));
    let addr = server
        .listen()
        .await
        .with_context(|| format!("failed to listen on {}", config.proxy_address))?;
    info!("Proxy router ready on {}", addr);

    let mut server_task = {
        let server = server.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { server.run(token).await })
    };

    let finished = tokio::select! {
        _ = signal::ctrl_c() => None,
        result = &mut server_task => Some(result),
    };
    shutdown.cancel();

    let server_result = match finished {
        Some(result) => result,
        None => {
            info!("Shutdown signal received, draining connections");
            server_task.await
        }
    };

    match server_result {
        Ok(Err(e)) if e.is_listener_closed() => {}
        Ok(Err(e)) => error!("Proxy server error: {}", e),
        Ok(Ok(())) => {}
        Err(e) => error!("Proxy server task failed: {}", e),
    }
    let _ = reconciler.await;

    info!("Proxy router stopped");
    Ok(())
}
