// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::chains::ChainConfig;
use crate::errors::{RejectReason, RouterError, RouterResult};

type ChainSigner = Arc<SignerMiddleware<Arc<Provider<Http>>, LocalWallet>>;

/// A write transaction with its nonce already assigned.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub nonce: U256,
}

/// Capabilities the registries need from a chain client.
#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// Account used for writes when the caller does not pick one.
    fn default_account(&self) -> Address;

    /// Read-only contract call against the latest visible state.
    async fn call(&self, to: Address, data: Bytes) -> RouterResult<Bytes>;

    /// Transaction count for `account`, including pending transactions.
    async fn transaction_count(&self, account: Address) -> RouterResult<U256>;

    async fn send_transaction(&self, tx: TxRequest) -> RouterResult<H256>;

    /// Resolves once the transaction is included (with the configured confirmations).
    async fn wait_for_inclusion(&self, tx_hash: H256) -> RouterResult<TransactionReceipt>;
}

pub struct EthersBackend {
    provider: Arc<Provider<Http>>,
    signers: HashMap<Address, ChainSigner>,
    default_account: Address,
    chain_id: u64,
    confirmations: usize,
    polling_interval: Duration,
}

impl EthersBackend {
    pub async fn connect(chain: &ChainConfig, private_key: &str) -> RouterResult<Self> {
        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
            .map_err(|e| RouterError::Backend(format!("failed to create provider: {}", e)))?
            .interval(chain.polling_interval);

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| RouterError::Backend(format!("failed to connect to RPC: {}", e)))?;

        if chain_id.as_u64() != chain.chain_id {
            return Err(RouterError::Backend(format!(
                "chain id mismatch: expected {}, got {}",
                chain.chain_id, chain_id
            )));
        }

        let mut backend = Self {
            provider: Arc::new(provider),
            signers: HashMap::new(),
            default_account: Address::zero(),
            chain_id: chain.chain_id,
            confirmations: chain.confirmation_blocks,
            polling_interval: chain.polling_interval,
        };
        backend.default_account = backend.add_signer(private_key)?;

        info!(
            "Connected to chain {} at {} as {:?}",
            chain.chain_id, chain.rpc_url, backend.default_account
        );

        Ok(backend)
    }

    /// Registers another signing key; returns its address.
    pub fn add_signer(&mut self, private_key: &str) -> RouterResult<Address> {
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| RouterError::InvalidArgument(format!("invalid private key: {}", e)))?
            .with_chain_id(self.chain_id);
        let address = wallet.address();

        let signer = SignerMiddleware::new(self.provider.clone(), wallet);
        self.signers.insert(address, Arc::new(signer));

        Ok(address)
    }

    fn signer_for(&self, account: Address) -> RouterResult<&ChainSigner> {
        self.signers
            .get(&account)
            .ok_or_else(|| RouterError::InvalidArgument(format!("no signer for {:?}", account)))
    }
}

#[async_trait]
impl ContractBackend for EthersBackend {
    fn default_account(&self) -> Address {
        self.default_account
    }

    async fn call(&self, to: Address, data: Bytes) -> RouterResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| RouterError::Backend(e.to_string()))
    }

    async fn transaction_count(&self, account: Address) -> RouterResult<U256> {
        self.provider
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| RouterError::Backend(e.to_string()))
    }

    async fn send_transaction(&self, tx: TxRequest) -> RouterResult<H256> {
        let signer = self.signer_for(tx.from)?;

        let request = TransactionRequest::new()
            .from(tx.from)
            .to(tx.to)
            .data(tx.data)
            .nonce(tx.nonce)
            .chain_id(self.chain_id);

        let pending = signer
            .send_transaction(request, None)
            .await
            .map_err(|e| RouterError::from_send_error(e.to_string()))?;

        debug!("Submitted transaction {:?} with nonce {}", pending.tx_hash(), tx.nonce);
        Ok(pending.tx_hash())
    }

    async fn wait_for_inclusion(&self, tx_hash: H256) -> RouterResult<TransactionReceipt> {
        let receipt = PendingTransaction::new(tx_hash, self.provider.as_ref())
            .interval(self.polling_interval)
            .confirmations(self.confirmations)
            .await
            .map_err(|e| RouterError::Backend(e.to_string()))?;

        receipt.ok_or(RouterError::TransactionRejected(RejectReason::Dropped))
    }
}
