// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory chain implementing [`ContractBackend`] for the marketplace and
//! token contracts. Used by tests and local development; it keeps nonces the
//! way a node does so concurrent-writer behaviour can be observed.

use async_trait::async_trait;
use ethers::abi::{encode, AbiDecode, AbiEncode, Token};
use ethers::contract::EthEvent;
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256, U64};
use ethers::utils::keccak256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::backend::{ContractBackend, TxRequest};
use super::types::*;
use crate::errors::{RouterError, RouterResult};
use crate::utils::hash::Hash;

struct SubmittedTx {
    from: Address,
    to: Address,
    nonce: U256,
    data: Bytes,
}

#[derive(Default)]
struct ChainState {
    block_number: u64,
    confirmed_nonces: HashMap<Address, u64>,
    pending: HashMap<H256, SubmittedTx>,
    pending_nonces: HashMap<Address, Vec<U256>>,
    submitted: Vec<(Address, U256)>,

    bids: HashMap<[u8; 32], BidRecord>,
    bid_order: Vec<[u8; 32]>,
    bid_nonces: HashMap<(Address, [u8; 32]), U256>,
    providers: HashMap<Address, ProviderRecord>,
    provider_order: Vec<Address>,
    models: HashMap<[u8; 32], ModelRecord>,
    model_order: Vec<[u8; 32]>,
    sessions: HashMap<[u8; 32], SessionRecord>,
    session_counter: u64,

    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,

    omit_events: bool,
    reject_next_send: Option<String>,
    session_duration: Option<i64>,
}

pub struct MockChain {
    account: Address,
    marketplace: Address,
    token: Address,
    inclusion_delay: Duration,
    requests: AtomicUsize,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(account: Address, marketplace: Address, token: Address) -> Self {
        Self {
            account,
            marketplace,
            token,
            inclusion_delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Delay between submission and inclusion, to widen race windows.
    pub fn with_inclusion_delay(mut self, delay: Duration) -> Self {
        self.inclusion_delay = delay;
        self
    }

    pub fn marketplace_address(&self) -> Address {
        self.marketplace
    }

    pub fn token_address(&self) -> Address {
        self.token
    }

    /// Number of backend requests served (reads, nonce reads, sends and waits).
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Every (account, nonce) pair accepted by `send_transaction`, in order.
    pub async fn submitted_nonces(&self) -> Vec<(Address, U256)> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn register_provider(&self, provider: Address, endpoint: &str, stake: U256) {
        let mut state = self.state.lock().await;
        if !state.providers.contains_key(&provider) {
            state.provider_order.push(provider);
        }
        let created_at = U256::from(now_secs());
        state.providers.insert(
            provider,
            ProviderRecord {
                endpoint: endpoint.to_string(),
                stake,
                created_at,
                is_deleted: false,
            },
        );
    }

    pub async fn register_model(&self, model_id: Hash, name: &str, owner: Address, stake: U256) {
        let mut state = self.state.lock().await;
        let key = model_id.to_fixed_bytes();
        if !state.models.contains_key(&key) {
            state.model_order.push(key);
        }
        state.models.insert(
            key,
            ModelRecord {
                name: name.to_string(),
                owner,
                stake,
                created_at: U256::from(now_secs()),
                is_deleted: false,
            },
        );
    }

    pub async fn mint(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().await;
        *state.balances.entry(account).or_default() += amount;
        state.total_supply += amount;
    }

    /// Included transactions carry no logs while set.
    pub async fn set_omit_events(&self, omit: bool) {
        self.state.lock().await.omit_events = omit;
    }

    /// The next `send_transaction` fails with `message`, as a node would report it.
    pub async fn reject_next_send(&self, message: &str) {
        self.state.lock().await.reject_next_send = Some(message.to_string());
    }

    /// Overrides the stake-derived duration of sessions opened from now on.
    /// Negative values produce sessions that end before they open.
    pub async fn set_session_duration(&self, seconds: Option<i64>) {
        self.state.lock().await.session_duration = seconds;
    }

    /// Closes a session on chain without going through a transaction.
    pub async fn close_session_externally(&self, session_id: Hash) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(session_id.as_bytes()) {
            session.closed_at = U256::from(now_secs());
        }
    }

    pub async fn set_session_ends_at(&self, session_id: Hash, ends_at: u64) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(session_id.as_bytes()) {
            session.ends_at = U256::from(ends_at);
        }
    }

    pub async fn forget_session(&self, session_id: Hash) {
        self.state.lock().await.sessions.remove(session_id.as_bytes());
    }

    fn touch(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn read_marketplace(&self, state: &ChainState, data: &[u8]) -> RouterResult<Vec<u8>> {
        let call = MarketplaceCalls::decode(data)?;
        let encoded = match call {
            MarketplaceCalls::GetBidById(call) => GetBidByIdReturn {
                bid: state
                    .bids
                    .get(&call.bid_id)
                    .cloned()
                    .unwrap_or_else(empty_bid),
            }
            .encode(),
            MarketplaceCalls::GetBidsByProvider(call) => {
                let (ids, bids) = page(state, call.offset, call.limit, |bid| {
                    bid.provider == call.provider
                });
                GetBidsByProviderReturn { ids, bids }.encode()
            }
            MarketplaceCalls::GetBidsByModelAgent(call) => {
                let (ids, bids) = page(state, call.offset, call.limit, |bid| {
                    bid.model_id == call.model_id
                });
                GetBidsByModelAgentReturn { ids, bids }.encode()
            }
            MarketplaceCalls::GetAllProviders(_) => {
                let providers = state
                    .provider_order
                    .iter()
                    .filter_map(|a| state.providers.get(a).cloned())
                    .collect();
                GetAllProvidersReturn {
                    addresses: state.provider_order.clone(),
                    providers,
                }
                .encode()
            }
            MarketplaceCalls::GetProvider(call) => GetProviderReturn {
                record: state
                    .providers
                    .get(&call.provider)
                    .cloned()
                    .unwrap_or_else(empty_provider),
            }
            .encode(),
            MarketplaceCalls::GetAllModels(_) => {
                let models = state
                    .model_order
                    .iter()
                    .filter_map(|id| state.models.get(id).cloned())
                    .collect();
                GetAllModelsReturn {
                    ids: state.model_order.clone(),
                    models,
                }
                .encode()
            }
            MarketplaceCalls::GetSession(call) => GetSessionReturn {
                session: state
                    .sessions
                    .get(&call.session_id)
                    .cloned()
                    .unwrap_or_else(empty_session),
            }
            .encode(),
            _ => return Err(RouterError::Backend("write method called via eth_call".into())),
        };
        Ok(encoded)
    }

    fn read_token(&self, state: &ChainState, data: &[u8]) -> RouterResult<Vec<u8>> {
        let call = MorTokenCalls::decode(data)?;
        let encoded = match call {
            MorTokenCalls::BalanceOf(call) => BalanceOfReturn {
                balance: state.balances.get(&call.account).copied().unwrap_or_default(),
            }
            .encode(),
            MorTokenCalls::Allowance(call) => AllowanceReturn {
                remaining: state
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or_default(),
            }
            .encode(),
            MorTokenCalls::TotalSupply(_) => TotalSupplyReturn {
                supply: state.total_supply,
            }
            .encode(),
            _ => return Err(RouterError::Backend("write method called via eth_call".into())),
        };
        Ok(encoded)
    }

    fn execute_marketplace(
        &self,
        state: &mut ChainState,
        from: Address,
        data: &[u8],
    ) -> Result<Vec<Log>, String> {
        let call = MarketplaceCalls::decode(data).map_err(|e| e.to_string())?;
        let now = U256::from(now_secs());
        let contract = self.marketplace;

        match call {
            MarketplaceCalls::PostModelBid(call) => {
                let key = (call.provider, call.model_id);
                let nonce = state.bid_nonces.get(&key).copied().unwrap_or_default();
                state.bid_nonces.insert(key, nonce + 1);

                let bid_id = keccak256(
                    [
                        call.provider.as_bytes(),
                        &call.model_id[..],
                        &u256_bytes(nonce)[..],
                    ]
                    .concat(),
                );
                state.bids.insert(
                    bid_id,
                    BidRecord {
                        provider: call.provider,
                        model_id: call.model_id,
                        price_per_second: call.price_per_second,
                        nonce,
                        created_at: now,
                        deleted_at: U256::zero(),
                    },
                );
                state.bid_order.push(bid_id);

                Ok(vec![bid_posted_log(
                    contract,
                    call.provider,
                    Hash::from(call.model_id),
                    Hash::from(bid_id),
                    nonce,
                )])
            }
            MarketplaceCalls::DeleteModelBid(call) => {
                let bid = state
                    .bids
                    .get_mut(&call.bid_id)
                    .ok_or_else(|| "bid not found".to_string())?;
                if !bid.deleted_at.is_zero() {
                    return Err("bid already deleted".to_string());
                }
                bid.deleted_at = now;
                Ok(vec![bid_deleted_log(
                    contract,
                    bid.provider,
                    Hash::from(bid.model_id),
                    Hash::from(call.bid_id),
                )])
            }
            MarketplaceCalls::OpenSession(call) => {
                let bid = state
                    .bids
                    .get(&call.bid_id)
                    .cloned()
                    .ok_or_else(|| "bid not found".to_string())?;
                if !bid.deleted_at.is_zero() {
                    return Err("bid deleted".to_string());
                }

                let opened_at = now.as_u64();
                let ends_at = match state.session_duration {
                    Some(seconds) => opened_at.saturating_add_signed(seconds),
                    None if bid.price_per_second.is_zero() => opened_at,
                    None => {
                        let duration = call.stake / bid.price_per_second;
                        opened_at.saturating_add(duration.min(U256::from(u32::MAX)).as_u64())
                    }
                };

                state.session_counter += 1;
                let session_id = keccak256(
                    [
                        from.as_bytes(),
                        &call.bid_id[..],
                        &state.session_counter.to_be_bytes()[..],
                    ]
                    .concat(),
                );
                state.sessions.insert(
                    session_id,
                    SessionRecord {
                        user: from,
                        provider: bid.provider,
                        bid_id: call.bid_id,
                        stake: call.stake,
                        price_per_second: bid.price_per_second,
                        opened_at: U256::from(opened_at),
                        ends_at: U256::from(ends_at),
                        closed_at: U256::zero(),
                    },
                );

                Ok(vec![session_opened_log(
                    contract,
                    from,
                    Hash::from(session_id),
                    bid.provider,
                    Hash::from(call.bid_id),
                    U256::from(opened_at),
                    U256::from(ends_at),
                )])
            }
            MarketplaceCalls::CloseSession(call) => {
                let session = state
                    .sessions
                    .get_mut(&call.session_id)
                    .ok_or_else(|| "session not found".to_string())?;
                if !session.closed_at.is_zero() {
                    return Err("session already closed".to_string());
                }
                session.closed_at = now;
                Ok(vec![session_closed_log(
                    contract,
                    session.user,
                    Hash::from(call.session_id),
                    session.provider,
                )])
            }
            _ => Err("view method sent as transaction".to_string()),
        }
    }

    fn execute_token(
        &self,
        state: &mut ChainState,
        from: Address,
        data: &[u8],
    ) -> Result<Vec<Log>, String> {
        let call = MorTokenCalls::decode(data).map_err(|e| e.to_string())?;

        match call {
            MorTokenCalls::Approve(call) => {
                state.allowances.insert((from, call.spender), call.amount);
                Ok(vec![approval_log(self.token, from, call.spender, call.amount)])
            }
            MorTokenCalls::Transfer(call) => {
                let balance = state.balances.get(&from).copied().unwrap_or_default();
                if balance < call.value {
                    return Err("ERC20: transfer amount exceeds balance".to_string());
                }
                state.balances.insert(from, balance - call.value);
                *state.balances.entry(call.to).or_default() += call.value;
                Ok(vec![transfer_log(self.token, from, call.to, call.value)])
            }
            _ => Err("view method sent as transaction".to_string()),
        }
    }
}

#[async_trait]
impl ContractBackend for MockChain {
    fn default_account(&self) -> Address {
        self.account
    }

    async fn call(&self, to: Address, data: Bytes) -> RouterResult<Bytes> {
        self.touch();
        let state = self.state.lock().await;

        let encoded = if to == self.marketplace {
            self.read_marketplace(&state, &data)?
        } else if to == self.token {
            self.read_token(&state, &data)?
        } else {
            return Err(RouterError::Backend(format!("no contract at {:?}", to)));
        };

        Ok(Bytes::from(encoded))
    }

    async fn transaction_count(&self, account: Address) -> RouterResult<U256> {
        self.touch();
        let state = self.state.lock().await;
        let confirmed = U256::from(state.confirmed_nonces.get(&account).copied().unwrap_or_default());
        // Pending count: in-flight transactions occupy their nonces too.
        let next_pending = state
            .pending_nonces
            .get(&account)
            .and_then(|in_flight| in_flight.iter().max())
            .map(|highest| *highest + 1)
            .unwrap_or_default();
        Ok(confirmed.max(next_pending))
    }

    async fn send_transaction(&self, tx: TxRequest) -> RouterResult<H256> {
        self.touch();
        let mut state = self.state.lock().await;

        if let Some(message) = state.reject_next_send.take() {
            return Err(RouterError::from_send_error(message));
        }

        let confirmed = U256::from(state.confirmed_nonces.get(&tx.from).copied().unwrap_or_default());
        if tx.nonce < confirmed {
            return Err(RouterError::from_send_error(format!(
                "nonce too low: next nonce {}, tx nonce {}",
                confirmed, tx.nonce
            )));
        }

        let in_flight = state.pending_nonces.entry(tx.from).or_default();
        if in_flight.contains(&tx.nonce) {
            return Err(RouterError::from_send_error(
                "replacement transaction underpriced",
            ));
        }
        in_flight.push(tx.nonce);
        state.submitted.push((tx.from, tx.nonce));

        let tx_hash = H256::from(keccak256(
            [tx.from.as_bytes(), &u256_bytes(tx.nonce)[..]].concat(),
        ));
        state.pending.insert(
            tx_hash,
            SubmittedTx {
                from: tx.from,
                to: tx.to,
                nonce: tx.nonce,
                data: tx.data,
            },
        );

        Ok(tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: H256) -> RouterResult<TransactionReceipt> {
        self.touch();
        if !self.inclusion_delay.is_zero() {
            tokio::time::sleep(self.inclusion_delay).await;
        }

        let mut state = self.state.lock().await;
        let tx = state
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| RouterError::Backend(format!("transaction {:?} not found", tx_hash)))?;

        // Mining a nonce also settles every lower one still in the pool.
        let confirmed = state.confirmed_nonces.entry(tx.from).or_default();
        *confirmed = (*confirmed).max(tx.nonce.as_u64() + 1);
        if let Some(in_flight) = state.pending_nonces.get_mut(&tx.from) {
            in_flight.retain(|n| *n > tx.nonce);
        }

        state.block_number += 1;
        let block_number = U64::from(state.block_number);

        let outcome = if tx.to == self.marketplace {
            self.execute_marketplace(&mut state, tx.from, &tx.data)
        } else if tx.to == self.token {
            self.execute_token(&mut state, tx.from, &tx.data)
        } else {
            Ok(Vec::new())
        };

        let (status, mut logs) = match outcome {
            Ok(logs) => (U64::one(), logs),
            Err(_) => (U64::zero(), Vec::new()),
        };
        if state.omit_events {
            logs.clear();
        }
        for log in logs.iter_mut() {
            log.transaction_hash = Some(tx_hash);
            log.block_number = Some(block_number);
        }

        Ok(TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(block_number),
            from: tx.from,
            to: Some(tx.to),
            status: Some(status),
            logs,
            ..Default::default()
        })
    }
}

fn page<F>(
    state: &ChainState,
    offset: U256,
    limit: u8,
    predicate: F,
) -> (Vec<[u8; 32]>, Vec<BidRecord>)
where
    F: Fn(&BidRecord) -> bool,
{
    let offset = offset.min(U256::from(usize::MAX)).as_usize();

    state
        .bid_order
        .iter()
        .filter_map(|id| state.bids.get(id).map(|bid| (*id, bid)))
        .filter(|(_, bid)| predicate(bid))
        .skip(offset)
        .take(limit as usize)
        .map(|(id, bid)| (id, bid.clone()))
        .unzip()
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn u256_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn empty_bid() -> BidRecord {
    BidRecord {
        provider: Address::zero(),
        model_id: [0u8; 32],
        price_per_second: U256::zero(),
        nonce: U256::zero(),
        created_at: U256::zero(),
        deleted_at: U256::zero(),
    }
}

fn empty_provider() -> ProviderRecord {
    ProviderRecord {
        endpoint: String::new(),
        stake: U256::zero(),
        created_at: U256::zero(),
        is_deleted: false,
    }
}

fn empty_session() -> SessionRecord {
    SessionRecord {
        user: Address::zero(),
        provider: Address::zero(),
        bid_id: [0u8; 32],
        stake: U256::zero(),
        price_per_second: U256::zero(),
        opened_at: U256::zero(),
        ends_at: U256::zero(),
        closed_at: U256::zero(),
    }
}

fn event_log(contract: Address, topics: Vec<H256>, data: Vec<Token>) -> Log {
    Log {
        address: contract,
        topics,
        data: Bytes::from(encode(&data)),
        ..Default::default()
    }
}

pub fn bid_posted_log(
    contract: Address,
    provider: Address,
    model_id: Hash,
    bid_id: Hash,
    nonce: U256,
) -> Log {
    event_log(
        contract,
        vec![
            BidPostedFilter::signature(),
            H256::from(provider),
            model_id.as_h256(),
        ],
        vec![
            Token::FixedBytes(bid_id.as_bytes().to_vec()),
            Token::Uint(nonce),
        ],
    )
}

pub fn bid_deleted_log(contract: Address, provider: Address, model_id: Hash, bid_id: Hash) -> Log {
    event_log(
        contract,
        vec![
            BidDeletedFilter::signature(),
            H256::from(provider),
            model_id.as_h256(),
        ],
        vec![Token::FixedBytes(bid_id.as_bytes().to_vec())],
    )
}

pub fn session_opened_log(
    contract: Address,
    user: Address,
    session_id: Hash,
    provider: Address,
    bid_id: Hash,
    opened_at: U256,
    ends_at: U256,
) -> Log {
    event_log(
        contract,
        vec![
            SessionOpenedFilter::signature(),
            H256::from(user),
            session_id.as_h256(),
            H256::from(provider),
        ],
        vec![
            Token::FixedBytes(bid_id.as_bytes().to_vec()),
            Token::Uint(opened_at),
            Token::Uint(ends_at),
        ],
    )
}

pub fn session_closed_log(
    contract: Address,
    user: Address,
    session_id: Hash,
    provider: Address,
) -> Log {
    event_log(
        contract,
        vec![
            SessionClosedFilter::signature(),
            H256::from(user),
            session_id.as_h256(),
            H256::from(provider),
        ],
        vec![],
    )
}

pub fn transfer_log(contract: Address, from: Address, to: Address, value: U256) -> Log {
    event_log(
        contract,
        vec![TransferFilter::signature(), H256::from(from), H256::from(to)],
        vec![Token::Uint(value)],
    )
}

pub fn approval_log(contract: Address, owner: Address, spender: Address, value: U256) -> Log {
    event_log(
        contract,
        vec![
            ApprovalFilter::signature(),
            H256::from(owner),
            H256::from(spender),
        ],
        vec![Token::Uint(value)],
    )
}
