// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, Bytes, TransactionReceipt, U256};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{closed_at_from_chain, timestamp_from_chain, Bid, ChainSession, Model, Provider, SessionOpened};
use crate::contracts::backend::ContractBackend;
use crate::contracts::events::{self, require_event};
use crate::contracts::issuer::TxIssuer;
use crate::contracts::types::*;
use crate::errors::{RouterError, RouterResult};
use crate::utils::hash::Hash;

/// Typed access to the marketplace contract: bids, providers, models and
/// session escrow. Reads go straight to the backend; writes are serialized
/// through the shared [`TxIssuer`] and only succeed once the confirming
/// event is found in the receipt.
pub struct MarketplaceRegistry {
    address: Address,
    account: Address,
    backend: Arc<dyn ContractBackend>,
    issuer: Arc<TxIssuer>,
}

impl MarketplaceRegistry {
    pub fn new(address: Address, issuer: Arc<TxIssuer>) -> Self {
        let backend = issuer.backend().clone();
        Self {
            address,
            account: backend.default_account(),
            backend,
            issuer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> Address {
        self.account
    }

    async fn read<C, R>(&self, call: C) -> RouterResult<R>
    where
        C: AbiEncode,
        R: AbiDecode,
    {
        let raw = self.backend.call(self.address, Bytes::from(call.encode())).await?;
        Ok(R::decode(raw.as_ref())?)
    }

    async fn write<C: AbiEncode>(&self, call: C) -> RouterResult<TransactionReceipt> {
        self.issuer
            .transact(self.account, self.address, Bytes::from(call.encode()))
            .await
    }

    pub async fn post_bid(
        &self,
        provider: Address,
        model_id: Hash,
        price_per_second: U256,
    ) -> RouterResult<Hash> {
        let receipt = self
            .write(PostModelBidCall {
                provider,
                model_id: model_id.to_fixed_bytes(),
                price_per_second,
            })
            .await?;

        let event = require_event(
            &receipt,
            self.address,
            &events::BidPosted { provider, model_id },
        )?;
        let bid_id = Hash::from(event.bid_id);

        info!(
            "Bid {} posted for model {} by {:?} at {} per second",
            bid_id, model_id, provider, price_per_second
        );
        Ok(bid_id)
    }

    pub async fn delete_bid(&self, bid_id: Hash) -> RouterResult<()> {
        let receipt = self
            .write(DeleteModelBidCall {
                bid_id: bid_id.to_fixed_bytes(),
            })
            .await?;

        require_event(&receipt, self.address, &events::BidDeleted { bid_id })?;
        info!("Bid {} withdrawn", bid_id);
        Ok(())
    }

    pub async fn get_bid(&self, bid_id: Hash) -> RouterResult<Bid> {
        let ret: GetBidByIdReturn = self
            .read(GetBidByIdCall {
                bid_id: bid_id.to_fixed_bytes(),
            })
            .await?;

        if ret.bid.provider.is_zero() {
            return Err(RouterError::BidNotFound(bid_id));
        }
        Ok(Bid::from_record(bid_id, ret.bid))
    }

    /// Page of bids posted by `provider`, oldest first. Withdrawn bids are included.
    pub async fn get_bids_by_provider(
        &self,
        provider: Address,
        offset: U256,
        limit: u8,
    ) -> RouterResult<Vec<Bid>> {
        check_limit(limit)?;

        let ret: GetBidsByProviderReturn = self
            .read(GetBidsByProviderCall {
                provider,
                offset,
                limit,
            })
            .await?;

        debug!("Fetched {} bids for provider {:?}", ret.ids.len(), provider);
        zip_bids(ret.ids, ret.bids)
    }

    /// Page of bids for `model_id`, oldest first. Withdrawn bids are included.
    pub async fn get_bids_by_model(
        &self,
        model_id: Hash,
        offset: U256,
        limit: u8,
    ) -> RouterResult<Vec<Bid>> {
        check_limit(limit)?;

        let ret: GetBidsByModelAgentReturn = self
            .read(GetBidsByModelAgentCall {
                model_id: model_id.to_fixed_bytes(),
                offset,
                limit,
            })
            .await?;

        debug!("Fetched {} bids for model {}", ret.ids.len(), model_id);
        zip_bids(ret.ids, ret.bids)
    }

    pub async fn get_all_providers(&self) -> RouterResult<Vec<Provider>> {
        let ret: GetAllProvidersReturn = self.read(GetAllProvidersCall).await?;

        if ret.addresses.len() != ret.providers.len() {
            return Err(RouterError::Decode(format!(
                "getAllProviders returned {} addresses for {} records",
                ret.addresses.len(),
                ret.providers.len()
            )));
        }

        Ok(ret
            .addresses
            .into_iter()
            .zip(ret.providers)
            .map(|(address, record)| Provider::from_record(address, record))
            .collect())
    }

    /// `None` when the address never registered as a provider.
    pub async fn get_provider(&self, address: Address) -> RouterResult<Option<Provider>> {
        let ret: GetProviderReturn = self.read(GetProviderCall { provider: address }).await?;

        if ret.record.created_at.is_zero() {
            return Ok(None);
        }
        Ok(Some(Provider::from_record(address, ret.record)))
    }

    pub async fn get_all_models(&self) -> RouterResult<Vec<Model>> {
        let ret: GetAllModelsReturn = self.read(GetAllModelsCall).await?;

        if ret.ids.len() != ret.models.len() {
            return Err(RouterError::Decode(format!(
                "getAllModels returned {} ids for {} records",
                ret.ids.len(),
                ret.models.len()
            )));
        }

        Ok(ret
            .ids
            .into_iter()
            .zip(ret.models)
            .map(|(id, record)| Model::from_record(Hash::from(id), record))
            .collect())
    }

    /// Opens an escrowed session against `bid_id`, staking `stake`.
    pub async fn open_session(&self, bid_id: Hash, stake: U256) -> RouterResult<SessionOpened> {
        let receipt = self
            .write(OpenSessionCall {
                bid_id: bid_id.to_fixed_bytes(),
                stake,
            })
            .await?;

        let event = require_event(
            &receipt,
            self.address,
            &events::SessionOpened {
                user: self.account,
                bid_id,
            },
        )?;

        Ok(SessionOpened {
            session_id: Hash::from(event.session_id),
            bid_id,
            user: event.user,
            provider: event.provider_id,
            opened_at: timestamp_from_chain(event.opened_at),
            ends_at: timestamp_from_chain(event.ends_at),
        })
    }

    pub async fn close_session(&self, session_id: Hash) -> RouterResult<()> {
        let receipt = self
            .write(CloseSessionCall {
                session_id: session_id.to_fixed_bytes(),
            })
            .await?;

        require_event(&receipt, self.address, &events::SessionClosed { session_id })?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: Hash) -> RouterResult<ChainSession> {
        let ret: GetSessionReturn = self
            .read(GetSessionCall {
                session_id: session_id.to_fixed_bytes(),
            })
            .await?;
        let record = ret.session;

        Ok(ChainSession {
            id: session_id,
            user: record.user,
            provider: record.provider,
            bid_id: Hash::from(record.bid_id),
            stake: record.stake,
            price_per_second: record.price_per_second,
            opened_at: timestamp_from_chain(record.opened_at),
            ends_at: timestamp_from_chain(record.ends_at),
            closed_at: closed_at_from_chain(record.closed_at),
        })
    }
}

fn check_limit(limit: u8) -> RouterResult<()> {
    if limit == 0 {
        return Err(RouterError::InvalidArgument(
            "limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn zip_bids(ids: Vec<[u8; 32]>, records: Vec<BidRecord>) -> RouterResult<Vec<Bid>> {
    if ids.len() != records.len() {
        return Err(RouterError::Decode(format!(
            "bid page returned {} ids for {} records",
            ids.len(),
            records.len()
        )));
    }

    Ok(ids
        .into_iter()
        .zip(records)
        .map(|(id, record)| Bid::from_record(Hash::from(id), record))
        .collect())
}
