// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::H256;

use crate::utils::hash::Hash;

/// Why the chain refused (or never confirmed) a write transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("execution reverted{}", revert_suffix(.0))]
    Reverted(String),

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    #[error("timed out waiting for inclusion")]
    InclusionTimeout,

    #[error("transaction dropped from mempool")]
    Dropped,

    #[error("{0}")]
    Other(String),
}

fn revert_suffix(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {}", reason)
    }
}

impl RejectReason {
    /// Maps raw node/middleware error text onto the rejection taxonomy.
    pub fn from_backend_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("insufficient funds")
            || lower.contains("insufficient balance")
            || lower.contains("exceeds balance")
        {
            return RejectReason::InsufficientFunds;
        }

        if lower.contains("nonce too low")
            || lower.contains("nonce too high")
            || lower.contains("replacement transaction underpriced")
            || lower.contains("already known")
        {
            return RejectReason::NonceConflict(message.to_string());
        }

        if lower.contains("gas required exceeds")
            || lower.contains("cannot estimate gas")
            || lower.contains("intrinsic gas too low")
            || lower.contains("out of gas")
        {
            return RejectReason::GasEstimation(message.to_string());
        }

        if let Some(idx) = lower.find("execution reverted") {
            let reason = message
                .get(idx + "execution reverted".len()..)
                .unwrap_or_default()
                .trim_start_matches(':')
                .trim();
            return RejectReason::Reverted(reason.to_string());
        }

        if lower.contains("revert") {
            return RejectReason::Reverted(message.to_string());
        }

        RejectReason::Other(message.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("bid not found: {0}")]
    BidNotFound(Hash),

    #[error("bid withdrawn: {0}")]
    BidWithdrawn(Hash),

    #[error("session not found: {0}")]
    SessionNotFound(Hash),

    #[error("session expired: {0}")]
    SessionExpired(Hash),

    #[error("session {id} is not open (status: {status})")]
    SessionNotOpen { id: Hash, status: String },

    #[error("transaction rejected: {0}")]
    TransactionRejected(RejectReason),

    #[error("transaction {tx_hash:?} included but {event} event not found in receipt")]
    ConfirmationEventMissing { tx_hash: H256, event: &'static str },

    #[error("listener closed")]
    ListenerClosed,

    #[error("cancelled")]
    Cancelled,

    #[error("accept error: {0}")]
    TransientAcceptError(std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no connection handler configured")]
    NoHandler,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("abi decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// Classifies a failed write submission. Anything that looks like a chain-level
    /// refusal becomes `TransactionRejected`; transport problems stay `Backend`.
    pub fn from_send_error(message: impl Into<String>) -> Self {
        let message = message.into();
        match RejectReason::from_backend_message(&message) {
            RejectReason::Other(_) if is_transport_failure(&message) => {
                RouterError::Backend(message)
            }
            reason => RouterError::TransactionRejected(reason),
        }
    }

    pub fn is_listener_closed(&self) -> bool {
        matches!(self, RouterError::ListenerClosed)
    }
}

fn is_transport_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection refused")
        || lower.contains("error sending request")
        || lower.contains("timed out")
        || lower.contains("dns error")
}

impl From<ethers::abi::Error> for RouterError {
    fn from(err: ethers::abi::Error) -> Self {
        RouterError::Decode(err.to_string())
    }
}

impl From<ethers::abi::AbiError> for RouterError {
    fn from(err: ethers::abi::AbiError) -> Self {
        RouterError::Decode(err.to_string())
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
