// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::{RouterError, RouterResult};

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub marketplace: Address,
    pub mor_token: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub contracts: ContractAddresses,
    pub confirmation_blocks: usize,
    #[serde(with = "duration_secs")]
    pub polling_interval: Duration,
}

impl ChainConfig {
    pub fn validate(&self) -> RouterResult<()> {
        let url = Url::parse(&self.rpc_url).map_err(|e| {
            RouterError::InvalidArgument(format!("invalid RPC URL {}: {}", self.rpc_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RouterError::InvalidArgument(format!(
                "RPC URL must be http(s), got {}",
                url.scheme()
            )));
        }

        if self.chain_id == 0 {
            return Err(RouterError::InvalidArgument("chain id must be set".to_string()));
        }
        if self.contracts.marketplace.is_zero() {
            return Err(RouterError::InvalidArgument(
                "marketplace address must be set".to_string(),
            ));
        }
        if self.contracts.mor_token.is_zero() {
            return Err(RouterError::InvalidArgument(
                "token address must be set".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
