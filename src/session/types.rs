// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::utils::hash::Hash;

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Opening => "opening",
            SessionStatus::Open => "open",
            SessionStatus::Closing => "closing",
            SessionStatus::Closed => "closed",
            SessionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A consumer session escrowed on chain against a provider's bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Hash,
    pub bid_id: Hash,
    pub consumer: Address,
    pub provider: Address,
    pub provider_endpoint: String,
    pub price_per_second: U256,
    pub stake: U256,
    pub opened_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as every reader should see it: an open session past its
    /// expiry is reported closed even before the record is updated.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Open && self.is_expired_at(now) {
            SessionStatus::Closed
        } else {
            self.status
        }
    }
}

/// What a relay needs to serve a session.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session_id: Hash,
    pub endpoint: String,
    pub expires_at: DateTime<Utc>,
    /// Cancelled when the session is closed, fails or is found expired.
    pub closed: CancellationToken,
}

impl ResolvedSession {
    pub fn time_remaining(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reconcile_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub closed: usize,
    pub failed: usize,
    pub expired: usize,
    pub rescheduled: usize,
    pub errors: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.closed + self.failed + self.expired + self.rescheduled > 0
    }
}
