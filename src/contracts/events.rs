// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt inspection for write confirmation.
//!
//! A write only counts as applied when its receipt carries the event the
//! contract emits for that call, from the contract that was called, with the
//! parameters the caller sent. Everything here is a pure function of the
//! receipt so it can be exercised with synthetic receipts.

use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::types::{Address, TransactionReceipt, U256};

use super::types::{
    ApprovalFilter, BidDeletedFilter, BidPostedFilter, SessionClosedFilter, SessionOpenedFilter,
    TransferFilter,
};
use crate::errors::{RouterError, RouterResult};
use crate::utils::hash::Hash;

/// Parameters a confirming event must carry.
pub trait ExpectedEvent {
    type Event: EthEvent;

    const NAME: &'static str;

    fn matches(&self, event: &Self::Event) -> bool;
}

/// First log in `receipt` emitted by `contract` that decodes as the expected
/// event and carries the expected parameters.
pub fn find_event<X: ExpectedEvent>(
    receipt: &TransactionReceipt,
    contract: Address,
    expected: &X,
) -> Option<X::Event> {
    let signature = X::Event::signature();

    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.first() == Some(&signature))
        .filter_map(|log| {
            X::Event::decode_log(&RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            })
            .ok()
        })
        .find(|event| expected.matches(event))
}

pub fn receipt_matches<X: ExpectedEvent>(
    receipt: &TransactionReceipt,
    contract: Address,
    expected: &X,
) -> bool {
    find_event(receipt, contract, expected).is_some()
}

/// Like [`find_event`], but a missing event is a `ConfirmationEventMissing` error.
pub fn require_event<X: ExpectedEvent>(
    receipt: &TransactionReceipt,
    contract: Address,
    expected: &X,
) -> RouterResult<X::Event> {
    find_event(receipt, contract, expected).ok_or(RouterError::ConfirmationEventMissing {
        tx_hash: receipt.transaction_hash,
        event: X::NAME,
    })
}

#[derive(Debug, Clone)]
pub struct BidPosted {
    pub provider: Address,
    pub model_id: Hash,
}

impl ExpectedEvent for BidPosted {
    type Event = BidPostedFilter;
    const NAME: &'static str = "BidPosted";

    fn matches(&self, event: &BidPostedFilter) -> bool {
        event.provider == self.provider && Hash::from(event.model_id) == self.model_id
    }
}

#[derive(Debug, Clone)]
pub struct BidDeleted {
    pub bid_id: Hash,
}

impl ExpectedEvent for BidDeleted {
    type Event = BidDeletedFilter;
    const NAME: &'static str = "BidDeleted";

    fn matches(&self, event: &BidDeletedFilter) -> bool {
        Hash::from(event.bid_id) == self.bid_id
    }
}

#[derive(Debug, Clone)]
pub struct SessionOpened {
    pub user: Address,
    pub bid_id: Hash,
}

impl ExpectedEvent for SessionOpened {
    type Event = SessionOpenedFilter;
    const NAME: &'static str = "SessionOpened";

    fn matches(&self, event: &SessionOpenedFilter) -> bool {
        event.user == self.user && Hash::from(event.bid_id) == self.bid_id
    }
}

#[derive(Debug, Clone)]
pub struct SessionClosed {
    pub session_id: Hash,
}

impl ExpectedEvent for SessionClosed {
    type Event = SessionClosedFilter;
    const NAME: &'static str = "SessionClosed";

    fn matches(&self, event: &SessionClosedFilter) -> bool {
        Hash::from(event.session_id) == self.session_id
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

impl ExpectedEvent for Transfer {
    type Event = TransferFilter;
    const NAME: &'static str = "Transfer";

    fn matches(&self, event: &TransferFilter) -> bool {
        event.from == self.from && event.to == self.to && event.value == self.value
    }
}

#[derive(Debug, Clone)]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

impl ExpectedEvent for Approval {
    type Event = ApprovalFilter;
    const NAME: &'static str = "Approval";

    fn matches(&self, event: &ApprovalFilter) -> bool {
        event.owner == self.owner && event.spender == self.spender && event.value == self.value
    }
}
