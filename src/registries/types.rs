// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::contracts::types::{BidRecord, ModelRecord, ProviderRecord};
use crate::utils::hash::Hash;

/// A provider's standing offer to serve a model at a price per second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: Hash,
    pub provider: Address,
    pub model_id: Hash,
    pub price_per_second: U256,
    pub nonce: U256,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Bid {
    pub fn from_record(id: Hash, record: BidRecord) -> Self {
        Self {
            id,
            provider: record.provider,
            model_id: Hash::from(record.model_id),
            price_per_second: record.price_per_second,
            nonce: record.nonce,
            created_at: timestamp_from_chain(record.created_at),
            deleted_at: optional_timestamp(record.deleted_at),
        }
    }

    pub fn is_withdrawn(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub address: Address,
    pub stake: U256,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Provider {
    pub fn from_record(address: Address, record: ProviderRecord) -> Self {
        Self {
            address,
            stake: record.stake,
            endpoint: record.endpoint,
            created_at: timestamp_from_chain(record.created_at),
            is_deleted: record.is_deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: Hash,
    pub name: String,
    pub owner: Address,
    pub stake: U256,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Model {
    pub fn from_record(id: Hash, record: ModelRecord) -> Self {
        Self {
            id,
            name: record.name,
            owner: record.owner,
            stake: record.stake,
            created_at: timestamp_from_chain(record.created_at),
            is_deleted: record.is_deleted,
        }
    }
}

/// Outcome of a confirmed `openSession` call, as reported by its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOpened {
    pub session_id: Hash,
    pub bid_id: Hash,
    pub user: Address,
    pub provider: Address,
    pub opened_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// On-chain view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSession {
    pub id: Hash,
    pub user: Address,
    pub provider: Address,
    pub bid_id: Hash,
    pub stake: U256,
    pub price_per_second: U256,
    pub opened_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChainSession {
    /// The contract returns a zeroed record for ids it has never seen.
    pub fn exists(&self) -> bool {
        !self.user.is_zero()
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// Converts a uint256 unix timestamp; values beyond the representable range clamp.
pub fn timestamp_from_chain(value: U256) -> DateTime<Utc> {
    let seconds = if value > U256::from(i64::MAX as u64) {
        i64::MAX
    } else {
        value.as_u64() as i64
    };

    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn optional_timestamp(value: U256) -> Option<DateTime<Utc>> {
    if value.is_zero() {
        None
    } else {
        Some(timestamp_from_chain(value))
    }
}

pub(crate) fn closed_at_from_chain(value: U256) -> Option<DateTime<Utc>> {
    optional_timestamp(value)
}
