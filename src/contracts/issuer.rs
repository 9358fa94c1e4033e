// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::backend::{ContractBackend, TxRequest};
use crate::errors::{RejectReason, RouterError, RouterResult};

pub const DEFAULT_INCLUSION_TIMEOUT: Duration = Duration::from_secs(120);

/// The write currently in flight for an account. At most one exists per account.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub account: Address,
    pub nonce: U256,
    pub tx_hash: H256,
    pub submitted_at: DateTime<Utc>,
}

/// Submits write transactions one account at a time.
///
/// A write holds its account's lock from the nonce read until the receipt is
/// in hand, so the next write for that account always sees the updated
/// transaction count. Writes for different accounts proceed independently.
pub struct TxIssuer {
    backend: Arc<dyn ContractBackend>,
    account_locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
    pending: RwLock<HashMap<Address, PendingTransaction>>,
    inclusion_timeout: Duration,
}

impl TxIssuer {
    pub fn new(backend: Arc<dyn ContractBackend>, inclusion_timeout: Duration) -> Self {
        Self {
            backend,
            account_locks: Mutex::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            inclusion_timeout,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ContractBackend> {
        &self.backend
    }

    async fn account_lock(&self, account: Address) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Sends `data` to `to` from `from` and waits for inclusion. A receipt with
    /// failed status is reported as a revert. No retries are attempted.
    pub async fn transact(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> RouterResult<TransactionReceipt> {
        let lock = self.account_lock(from).await;
        let _guard = lock.lock().await;

        let nonce = self.backend.transaction_count(from).await?;
        debug!("Issuing transaction from {:?} to {:?} with nonce {}", from, to, nonce);

        let tx_hash = self
            .backend
            .send_transaction(TxRequest {
                from,
                to,
                data,
                nonce,
            })
            .await?;

        self.pending.write().await.insert(
            from,
            PendingTransaction {
                account: from,
                nonce,
                tx_hash,
                submitted_at: Utc::now(),
            },
        );

        let outcome =
            tokio::time::timeout(self.inclusion_timeout, self.backend.wait_for_inclusion(tx_hash))
                .await;

        self.pending.write().await.remove(&from);

        let receipt = match outcome {
            Ok(receipt) => receipt?,
            Err(_) => {
                warn!(
                    "Transaction {:?} not included within {:?}",
                    tx_hash, self.inclusion_timeout
                );
                return Err(RouterError::TransactionRejected(
                    RejectReason::InclusionTimeout,
                ));
            }
        };

        if receipt.status == Some(U64::zero()) {
            warn!("Transaction {:?} reverted", tx_hash);
            return Err(RouterError::TransactionRejected(RejectReason::Reverted(
                String::new(),
            )));
        }

        info!(
            "Transaction {:?} included in block {:?}",
            tx_hash, receipt.block_number
        );
        Ok(receipt)
    }

    /// The write currently awaiting inclusion for `account`, if any.
    pub async fn pending_for(&self, account: Address) -> Option<PendingTransaction> {
        self.pending.read().await.get(&account).cloned()
    }
}
