// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use ethers::types::Address;
use std::time::Duration;

use super::chains::{ChainConfig, ContractAddresses};
use crate::errors::RouterResult;
use crate::proxy::ForwarderConfig;
use crate::session::SessionConfig;

/// Proxy router configuration. Every option can also come from the environment
/// (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(name = "proxy-router")]
#[command(about = "Session-backed inference proxy router", long_about = None)]
pub struct RouterConfig {
    /// Address the proxy listens on
    #[arg(long, env = "PROXY_ADDRESS", default_value = "0.0.0.0:3333")]
    pub proxy_address: String,

    /// Ethereum JSON-RPC endpoint
    #[arg(long, env = "ETH_NODE_ADDRESS")]
    pub eth_node_address: String,

    /// Expected chain id of the RPC endpoint
    #[arg(long, env = "ETH_NODE_CHAIN_ID")]
    pub chain_id: u64,

    /// Marketplace (diamond) contract address
    #[arg(long, env = "DIAMOND_CONTRACT_ADDRESS")]
    pub marketplace_address: Address,

    /// Staking token contract address
    #[arg(long, env = "MOR_TOKEN_ADDRESS")]
    pub mor_token_address: Address,

    /// Private key of the account that signs transactions
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    pub wallet_private_key: String,

    /// Blocks to wait after inclusion before a write counts as confirmed
    #[arg(long, env = "ETH_CONFIRMATION_BLOCKS", default_value_t = 1)]
    pub confirmation_blocks: usize,

    /// Receipt polling interval in seconds
    #[arg(long, env = "ETH_POLLING_INTERVAL", default_value_t = 2)]
    pub polling_interval_secs: u64,

    /// Seconds between session reconciliation passes
    #[arg(long, env = "SESSION_RECONCILE_INTERVAL", default_value_t = 30)]
    pub reconcile_interval_secs: u64,

    /// Seconds to wait for a transaction to be included
    #[arg(long, env = "TX_INCLUSION_TIMEOUT", default_value_t = 120)]
    pub inclusion_timeout_secs: u64,

    /// Seconds a client has to send its session handshake
    #[arg(long, env = "HANDSHAKE_TIMEOUT", default_value_t = 10)]
    pub handshake_timeout_secs: u64,

    /// Seconds allowed for dialing a provider
    #[arg(long, env = "PROVIDER_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout_secs: u64,
}

impl RouterConfig {
    pub fn chain(&self) -> RouterResult<ChainConfig> {
        let chain = ChainConfig {
            chain_id: self.chain_id,
            rpc_url: self.eth_node_address.clone(),
            contracts: ContractAddresses {
                marketplace: self.marketplace_address,
                mor_token: self.mor_token_address,
            },
            confirmation_blocks: self.confirmation_blocks,
            polling_interval: Duration::from_secs(self.polling_interval_secs),
        };
        chain.validate()?;
        Ok(chain)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs.max(1)),
        }
    }

    pub fn forwarder(&self) -> ForwarderConfig {
        ForwarderConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }
}
