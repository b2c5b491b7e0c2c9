//! Per-(user, method) attempt counting and lockout state.
//!
//! [`RateLimitStore`] is the single source of truth for attempt counters.
//! `record_failure` must be atomic (increment-and-compare in one step) so
//! racing verification attempts can never under-count; when in doubt an
//! implementation fails closed toward stricter lockout. The in-memory
//! implementation here is suitable for a single process; multi-instance
//! deployments back the trait with a shared key-level atomic store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use vigil_core::UserId;

use crate::error::MfaStoreError;
use crate::method::MfaMethodType;
use crate::policy::MfaPolicy;

/// Key identifying one attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitKey {
    pub user_id: UserId,
    pub method: MfaMethodType,
}

/// Attempt counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub attempt_count: u32,
    pub window_start: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// A zeroed counter starting a fresh window at `now`.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            attempt_count: 0,
            window_start: now,
            locked_until: None,
        }
    }

    /// Whether the key is locked at `now`.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Contract for the shared attempt-counter backend.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current state for `key` with expired lockouts and stale windows
    /// already collapsed (lazy transition: no background timer).
    async fn state(&self, key: &RateLimitKey, now: DateTime<Utc>)
        -> Result<RateLimitState, MfaStoreError>;

    /// Atomically record one failed attempt and lock the key if the
    /// attempt limit is reached. Returns the post-increment state. Calls
    /// against an already-locked key leave the state untouched.
    async fn record_failure(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitState, MfaStoreError>;

    /// Clear the counter after a successful verification.
    async fn reset(&self, key: &RateLimitKey) -> Result<(), MfaStoreError>;
}

/// In-process reference implementation.
pub struct InMemoryRateLimitStore {
    max_attempts: u32,
    attempt_window: Duration,
    lockout_duration: Duration,
    entries: Mutex<HashMap<RateLimitKey, RateLimitState>>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new(policy: &MfaPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            attempt_window: policy.attempt_window,
            lockout_duration: policy.lockout_duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose lockout and attempt window have both lapsed.
    /// Returns the number of entries removed. Reads already collapse
    /// stale entries lazily; this sweep reclaims keys nothing reads
    /// again, so call it periodically from a maintenance task.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, state| !self.is_stale(state, now));
        before - entries.len()
    }

    fn is_stale(&self, state: &RateLimitState, now: DateTime<Utc>) -> bool {
        if let Some(until) = state.locked_until {
            return now >= until;
        }
        now - state.window_start > self.attempt_window
    }

    /// Collapse expired lockouts and stale windows.
    fn normalize(&self, state: RateLimitState, now: DateTime<Utc>) -> RateLimitState {
        if self.is_stale(&state, now) {
            return RateLimitState::fresh(now);
        }
        state
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn state(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitState, MfaStoreError> {
        let mut entries = self.entries.lock();
        let Some(state) = entries.get(key).copied() else {
            return Ok(RateLimitState::fresh(now));
        };
        // Reads never allocate: a collapsed entry is evicted, not
        // re-inserted, so probing arbitrary keys cannot grow the map.
        if self.is_stale(&state, now) {
            entries.remove(key);
            return Ok(RateLimitState::fresh(now));
        }
        Ok(state)
    }

    async fn record_failure(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitState, MfaStoreError> {
        let mut entries = self.entries.lock();
        let state = entries
            .get(key)
            .copied()
            .unwrap_or_else(|| RateLimitState::fresh(now));
        let mut state = self.normalize(state, now);

        if !state.is_locked(now) {
            state.attempt_count += 1;
            if state.attempt_count >= self.max_attempts {
                state.locked_until = Some(now + self.lockout_duration);
            }
        }

        entries.insert(*key, state);
        Ok(state)
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), MfaStoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
