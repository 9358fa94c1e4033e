// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::Utc;
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{ReconcileReport, ResolvedSession, Session, SessionConfig, SessionStatus};
use crate::errors::{RouterError, RouterResult};
use crate::registries::MarketplaceRegistry;
use crate::utils::hash::Hash;

struct SessionEntry {
    session: Session,
    closed: CancellationToken,
}

impl SessionEntry {
    /// Moves to a terminal status and wakes every relay serving the session.
    fn finish(&mut self, status: SessionStatus) {
        self.session.status = status;
        self.closed.cancel();
    }
}

/// Tracks the sessions this router opened and ties each to its on-chain escrow.
///
/// Status changes happen under the write lock, so a reader sees either the
/// old record or the new one. Expiry is applied optimistically: an open
/// session past its deadline is treated as closed by every reader and the
/// background reconciler catches up with the chain.
pub struct SessionManager {
    marketplace: Arc<MarketplaceRegistry>,
    sessions: Arc<RwLock<HashMap<Hash, SessionEntry>>>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(marketplace: Arc<MarketplaceRegistry>, config: SessionConfig) -> Self {
        Self {
            marketplace,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn marketplace(&self) -> &Arc<MarketplaceRegistry> {
        &self.marketplace
    }

    /// Opens an escrowed session on `bid_id`. Nothing is sent on chain when
    /// the bid is missing or withdrawn.
    pub async fn open_session(&self, bid_id: Hash, stake: U256) -> RouterResult<Session> {
        let bid = self.marketplace.get_bid(bid_id).await?;
        if bid.is_withdrawn() {
            return Err(RouterError::BidWithdrawn(bid_id));
        }

        let provider = self
            .marketplace
            .get_provider(bid.provider)
            .await?
            .filter(|p| !p.is_deleted)
            .ok_or_else(|| {
                RouterError::InvalidArgument(format!(
                    "provider {:?} of bid {} is not registered",
                    bid.provider, bid_id
                ))
            })?;

        let opened = self.marketplace.open_session(bid_id, stake).await?;

        let session = Session {
            id: opened.session_id,
            bid_id,
            consumer: opened.user,
            provider: opened.provider,
            provider_endpoint: provider.endpoint,
            price_per_second: bid.price_per_second,
            stake,
            opened_at: opened.opened_at,
            expires_at: opened.ends_at,
            status: SessionStatus::Open,
        };

        self.sessions.write().await.insert(
            session.id,
            SessionEntry {
                session: session.clone(),
                closed: CancellationToken::new(),
            },
        );

        info!(
            "Session {} opened on bid {} until {}",
            session.id, bid_id, session.expires_at
        );
        Ok(session)
    }

    /// Endpoint and deadline for an open session.
    pub async fn resolve_session(&self, session_id: Hash) -> RouterResult<ResolvedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(RouterError::SessionNotFound(session_id))?;

        if entry.session.is_expired_at(Utc::now()) {
            if entry.session.status == SessionStatus::Open {
                info!("Session {} expired at {}", session_id, entry.session.expires_at);
                entry.finish(SessionStatus::Closed);
            }
            return Err(RouterError::SessionExpired(session_id));
        }

        if entry.session.status != SessionStatus::Open {
            return Err(RouterError::SessionNotOpen {
                id: session_id,
                status: entry.session.status.to_string(),
            });
        }

        Ok(ResolvedSession {
            session_id,
            endpoint: entry.session.provider_endpoint.clone(),
            expires_at: entry.session.expires_at,
            closed: entry.closed.clone(),
        })
    }

    /// Closes the session on chain. Closing a closed or failed session is a no-op.
    pub async fn close_session(&self, session_id: Hash) -> RouterResult<()> {
        {
            let mut sessions = self.sessions.write().await;
            let entry = sessions
                .get_mut(&session_id)
                .ok_or(RouterError::SessionNotFound(session_id))?;

            match entry.session.status {
                SessionStatus::Closed | SessionStatus::Failed => return Ok(()),
                SessionStatus::Opening | SessionStatus::Closing => {
                    return Err(RouterError::SessionNotOpen {
                        id: session_id,
                        status: entry.session.status.to_string(),
                    });
                }
                SessionStatus::Open => {}
            }

            if entry.session.is_expired_at(Utc::now()) {
                debug!("Session {} already expired; marking closed", session_id);
                entry.finish(SessionStatus::Closed);
                return Ok(());
            }

            entry.session.status = SessionStatus::Closing;
        }

        let outcome = self.marketplace.close_session(session_id).await;

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(RouterError::SessionNotFound(session_id))?;

        match outcome {
            Ok(()) => {
                entry.finish(SessionStatus::Closed);
                info!("Session {} closed", session_id);
                Ok(())
            }
            Err(e) => {
                if entry.session.status == SessionStatus::Closing {
                    entry.session.status = SessionStatus::Open;
                }
                warn!("Failed to close session {}: {}", session_id, e);
                Err(e)
            }
        }
    }

    /// Snapshot with expiry applied.
    pub async fn get_session(&self, session_id: Hash) -> Option<Session> {
        let now = Utc::now();
        self.sessions.read().await.get(&session_id).map(|entry| {
            let mut session = entry.session.clone();
            session.status = session.effective_status(now);
            session
        })
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .map(|entry| {
                let mut session = entry.session.clone();
                session.status = session.effective_status(now);
                session
            })
            .collect()
    }

    /// Brings open sessions in line with the chain: closed there means
    /// closed here, unknown there means failed, a moved end time moves
    /// the local deadline. Expiry is only applied against the chain's
    /// current end time.
    pub async fn reconcile_once(&self) -> RouterResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut last_error = None;

        let candidates: Vec<Hash> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.session.status == SessionStatus::Open)
            .map(|entry| entry.session.id)
            .collect();

        for session_id in candidates {
            report.checked += 1;

            let chain = match self.marketplace.get_session(session_id).await {
                Ok(chain) => chain,
                Err(e) => {
                    warn!("Reconcile: failed to read session {}: {}", session_id, e);
                    report.errors += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            let mut sessions = self.sessions.write().await;
            let Some(entry) = sessions.get_mut(&session_id) else {
                continue;
            };
            if entry.session.status != SessionStatus::Open {
                continue;
            }

            if !chain.exists() {
                warn!("Session {} is unknown on chain; marking failed", session_id);
                entry.finish(SessionStatus::Failed);
                report.failed += 1;
            } else if chain.is_closed() {
                info!("Session {} was closed on chain", session_id);
                entry.finish(SessionStatus::Closed);
                report.closed += 1;
            } else if chain.ends_at != entry.session.expires_at {
                debug!(
                    "Session {} end moved from {} to {}",
                    session_id, entry.session.expires_at, chain.ends_at
                );
                entry.session.expires_at = chain.ends_at;
                report.rescheduled += 1;
            }

            if entry.session.status == SessionStatus::Open
                && entry.session.is_expired_at(Utc::now())
            {
                info!("Session {} expired at {}", session_id, entry.session.expires_at);
                entry.finish(SessionStatus::Closed);
                report.expired += 1;
            }
        }

        match last_error {
            Some(e) if report.errors == report.checked => Err(e),
            _ => Ok(report),
        }
    }

    /// Runs [`reconcile_once`](Self::reconcile_once) every configured
    /// interval until `cancel` fires.
    pub fn spawn_reconciler(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.reconcile_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Session reconciler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.reconcile_once().await {
                            Ok(report) if report.changed() => info!("Reconciled sessions: {:?}", report),
                            Ok(_) => {}
                            Err(e) => warn!("Session reconciliation failed: {}", e),
                        }
                    }
                }
            }
        })
    }
}
