// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, Bytes, H256, U256};
use std::sync::Arc;
use tracing::info;

use crate::contracts::backend::ContractBackend;
use crate::contracts::events::{self, require_event};
use crate::contracts::issuer::TxIssuer;
use crate::contracts::types::*;
use crate::errors::RouterResult;

/// Balance and allowance access for the staking token.
pub struct MorTokenRegistry {
    address: Address,
    account: Address,
    backend: Arc<dyn ContractBackend>,
    issuer: Arc<TxIssuer>,
}

impl MorTokenRegistry {
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

    async fn read<C: AbiEncode, R: AbiDecode>(&self, call: C) -> RouterResult<R> {
        let raw = self.backend.call(self.address, Bytes::from(call.encode())).await?;
        Ok(R::decode(raw.as_ref())?)
    }

    pub async fn get_balance(&self, account: Address) -> RouterResult<U256> {
        let ret: BalanceOfReturn = self.read(BalanceOfCall { account }).await?;
        Ok(ret.balance)
    }

    pub async fn get_allowance(&self, owner: Address, spender: Address) -> RouterResult<U256> {
        let ret: AllowanceReturn = self.read(AllowanceCall { owner, spender }).await?;
        Ok(ret.remaining)
    }

    pub async fn get_total_supply(&self) -> RouterResult<U256> {
        let ret: TotalSupplyReturn = self.read(TotalSupplyCall).await?;
        Ok(ret.supply)
    }

    /// Sets `spender`'s allowance over the router account's tokens to `amount`.
    pub async fn approve(&self, spender: Address, amount: U256) -> RouterResult<H256> {
        let data = ApproveCall { spender, amount }.encode();
        let receipt = self
            .issuer
            .transact(self.account, self.address, Bytes::from(data))
            .await?;

        require_event(
            &receipt,
            self.address,
            &events::Approval {
                owner: self.account,
                spender,
                value: amount,
            },
        )?;

        info!("Approved {} tokens for {:?}", amount, spender);
        Ok(receipt.transaction_hash)
    }

    pub async fn transfer(&self, to: Address, value: U256) -> RouterResult<H256> {
        let data = TransferCall { to, value }.encode();
        let receipt = self
            .issuer
            .transact(self.account, self.address, Bytes::from(data))
            .await?;

        require_event(
            &receipt,
            self.address,
            &events::Transfer {
                from: self.account,
                to,
                value,
            },
        )?;

        info!("Transferred {} tokens to {:?}", value, to);
        Ok(receipt.transaction_hash)
    }
}
