//! Outstanding CSRF state tokens
//!
//! A state token is issued by `begin_login` and consumed by the matching
//! callback. Consumption is a single atomic removal, so for one stored token
//! exactly one caller ever observes `true`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::{models::OAuth2Provider, Error, Result};

/// Storage for outstanding state tokens, keyed by (session, provider, state)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Register `state` for this session and provider until `ttl` elapses
    async fn put(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        state: &str,
        ttl: Duration,
    ) -> Result<()>;

    /// Atomically check and remove a state token
    ///
    /// Unknown, expired and already consumed tokens yield `false`.
    async fn verify_and_consume(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        supplied_state: &str,
    ) -> Result<bool>;
}

/// Outstanding authorization attempt, private to the store.
/// Session and state value live in the map key.
#[derive(Debug, Clone)]
struct AuthorizationState {
    provider: OAuth2Provider,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AuthorizationState {
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    session_id: String,
    provider: OAuth2Provider,
    state: String,
}

/// Number of entries above which `put` sweeps expired states
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// Minimum spacing between two sweeps triggered by `put`
const SWEEP_INTERVAL_MS: i64 = 1_000;

/// In-process state store
///
/// Expired entries are dropped when looked up, and swept in bulk once the
/// map grows past a threshold, at most once per second. Suitable for
/// single-node deployments.
pub struct MemoryStateStore {
    states: DashMap<StateKey, AuthorizationState>,
    sweep_threshold: usize,
    /// Unix millis of the last threshold sweep
    last_sweep_ms: AtomicI64,
}

impl std::fmt::Debug for MemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStateStore")
            .field("outstanding", &self.states.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    #[must_use]
    pub fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        Self {
            states: DashMap::new(),
            sweep_threshold,
            last_sweep_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Number of stored entries, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn put_at(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        state: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::InvalidInput(format!("Invalid state TTL: {e}")))?;

        let key = StateKey {
            session_id: session_id.to_string(),
            provider,
            state: state.to_string(),
        };
        self.states.insert(
            key,
            AuthorizationState {
                provider,
                created_at: now,
                expires_at: now + ttl,
            },
        );

        if self.states.len() > self.sweep_threshold && self.claim_sweep(now) {
            self.purge_expired_at(now);
        }
        Ok(())
    }

    #[must_use]
    pub fn verify_and_consume_at(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        supplied_state: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let key = StateKey {
            session_id: session_id.to_string(),
            provider,
            state: supplied_state.to_string(),
        };

        // Removal is the linearization point: a concurrent caller with the
        // same key finds nothing.
        match self.states.remove(&key) {
            Some((_, entry)) if entry.is_live_at(now) => {
                debug!(
                    provider = %entry.provider,
                    age_seconds = (now - entry.created_at).num_seconds(),
                    "Consumed OAuth2 state"
                );
                true
            }
            Some((_, entry)) => {
                debug!(provider = %entry.provider, "Rejected expired OAuth2 state");
                false
            }
            None => false,
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Only one caller per interval wins the right to sweep
    fn claim_sweep(&self, now: DateTime<Utc>) -> bool {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) < SWEEP_INTERVAL_MS {
            return false;
        }
        self.last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| state.is_live_at(now));
        let removed = before.saturating_sub(self.states.len());
        if removed > 0 {
            debug!("Cleaned up {} expired OAuth2 states", removed);
        }
        removed
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        state: &str,
        ttl: Duration,
    ) -> Result<()> {
        self.put_at(session_id, provider, state, ttl, Utc::now())
    }

    async fn verify_and_consume(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        supplied_state: &str,
    ) -> Result<bool> {
        Ok(self.verify_and_consume_at(session_id, provider, supplied_state, Utc::now()))
    }
}

/// Redis-backed state store for multi-replica deployments
///
/// Entries expire through Redis `EX`; consumption uses `GETDEL`, which is
/// atomic on the server. Keys hold a SHA-256 of the session and state,
/// never the raw values.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStateStore {
    #[must_use]
    pub const fn new(conn: redis::aio::ConnectionManager, key_prefix: String) -> Self {
        Self { conn, key_prefix }
    }

    /// Connect to Redis at `url`
    pub async fn connect(url: &str, key_prefix: String) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self::new(conn, key_prefix))
    }

    fn key(&self, session_id: &str, provider: OAuth2Provider, state: &str) -> String {
        state_key(&self.key_prefix, session_id, provider, state)
    }
}

fn state_key(prefix: &str, session_id: &str, provider: OAuth2Provider, state: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(state.as_bytes());
    format!("{prefix}oauth2_state:{provider}:{}", hex::encode(hasher.finalize()))
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn put(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        state: &str,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(self.key(session_id, provider, state))
            .arg(Utc::now().timestamp())
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn verify_and_consume(
        &self,
        session_id: &str,
        provider: OAuth2Provider,
        supplied_state: &str,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let stored: Option<String> = redis::cmd("GETDEL")
            .arg(self.key(session_id, provider, supplied_state))
            .query_async(&mut conn)
            .await?;
        Ok(stored.is_some())
    }
}
