//! Session token storage.
//!
//! # Responsibilities
//! - Map access tokens to their refresh token with an expiry
//! - Track pending login `state` values until the callback consumes them
//! - Purge expired entries on a background sweep
//!
//! # Design Decisions
//! - Constructed at startup and injected; no process-wide map
//! - A token is valid iff present and not expired
//! - DashMap shards the lock so concurrent checks do not serialize

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::auth::provider::TokenSet;
use crate::observability::metrics;

/// What the store keeps for one access token.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub refresh_token: String,
    /// ID token issued alongside the access token, if any.
    pub id_token: Option<String>,
    pub expires_at: Instant,
}

impl TokenRecord {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Longest lifetime any token or login state can have.
pub const MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Deadline `ttl` from `now`, capped at `MAX_LIFETIME`.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_LIFETIME)).unwrap_or(now)
}

/// Thread-safe access-token store.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<DashMap<String, TokenRecord>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a token with the default lifetime. Replaces any previous record.
    pub fn put(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        self.put_with_ttl(access_token, refresh_token, self.ttl);
    }

    pub fn put_with_ttl(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl: Duration,
    ) {
        self.insert(access_token.into(), refresh_token.into(), None, ttl);
    }

    /// Store a full token exchange result, binding its ID token to the session.
    pub fn put_session(&self, tokens: &TokenSet) {
        self.insert(
            tokens.access_token.clone(),
            tokens.refresh_token.clone(),
            Some(tokens.id_token.clone()),
            self.ttl,
        );
    }

    fn insert(&self, access_token: String, refresh_token: String, id_token: Option<String>, ttl: Duration) {
        self.inner.insert(
            access_token,
            TokenRecord {
                refresh_token,
                id_token,
                expires_at: expiry(Instant::now(), ttl),
            },
        );
        metrics::record_token_store_size(self.inner.len());
    }

    /// True if the token is known and still live.
    pub fn contains(&self, access_token: &str) -> bool {
        self.inner
            .get(access_token)
            .map(|r| !r.value().is_expired(Instant::now()))
            .unwrap_or(false)
    }

    pub fn get(&self, access_token: &str) -> Option<TokenRecord> {
        self.inner
            .get(access_token)
            .map(|r| r.value().clone())
            .filter(|r| !r.is_expired(Instant::now()))
    }

    pub fn remove(&self, access_token: &str) -> Option<TokenRecord> {
        let removed = self.inner.remove(access_token).map(|(_, record)| record);
        metrics::record_token_store_size(self.inner.len());
        removed
    }

    /// Drop every expired record, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, record| !record.is_expired(now));
        let after = self.inner.len();
        metrics::record_token_store_size(after);
        before.saturating_sub(after)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Pending OAuth2 `state` values. Each is accepted once, before it expires.
#[derive(Clone)]
pub struct LoginStates {
    inner: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl LoginStates {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Generate and remember a fresh random state.
    pub fn issue(&self) -> String {
        let state = random_token(32);
        self.inner.insert(state.clone(), expiry(Instant::now(), self.ttl));
        state
    }

    /// Consume `state`; false if unknown, already used or expired.
    pub fn take(&self, state: &str) -> bool {
        self.inner
            .remove(state)
            .map(|(_, expires_at)| Instant::now() < expires_at)
            .unwrap_or(false)
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, expires_at| now < *expires_at);
        before.saturating_sub(self.inner.len())
    }
}

/// Random URL-safe token.
pub fn random_token(len: usize) -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Periodically purge expired tokens and login states until shutdown.
pub async fn run_sweeper(
    tokens: TokenStore,
    states: LoginStates,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tokens_purged = tokens.purge_expired();
                let states_purged = states.purge_expired();
                if tokens_purged > 0 || states_purged > 0 {
                    tracing::debug!(
                        tokens_purged,
                        states_purged,
                        remaining = tokens.len(),
                        "Expired sessions purged"
                    );
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Token sweeper stopping");
                break;
            }
        }
    }
}
