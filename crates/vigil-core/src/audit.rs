//! Security event stream and the audit-log collaborator contract.
//!
//! The authentication core never persists events itself: every component
//! that produces a [`SecurityEvent`] hands it to an [`AuditLogStore`]
//! immediately and holds no copy afterwards. Events can be stored by
//! different backends (database, SIEM pipeline, in-memory for testing).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::ids::{EventId, UserId};

/// Severity attached to a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Low => write!(f, "low"),
            EventSeverity::Medium => write!(f, "medium"),
            EventSeverity::High => write!(f, "high"),
            EventSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A single security event, owned by the audit store after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub event_type: String,
    pub severity: EventSeverity,
    /// Opaque structured payload; consumers decide how to interpret it.
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: UserId,
        event_type: impl Into<String>,
        severity: EventSeverity,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            user_id,
            event_type: event_type.into(),
            severity,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Failure talking to the audit backend.
#[derive(Debug, Clone, thiserror::Error)]
#[error("audit store unavailable: {0}")]
pub struct AuditStoreError(pub String);

/// Contract for audit-log backends.
///
/// Callers in the authentication core treat this store as advisory:
/// query failures degrade the behavioral signal to neutral and append
/// failures are swallowed after a warning. Implementations should still
/// report errors honestly so those call sites can log them.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Return all events for `user_id` recorded at or after `since`.
    async fn query(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SecurityEvent>, AuditStoreError>;

    /// Append one event; ownership transfers to the store.
    async fn append(&self, event: SecurityEvent) -> Result<(), AuditStoreError>;
}

/// In-memory audit store for testing.
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: RwLock<HashMap<UserId, Vec<SecurityEvent>>>,
}

impl InMemoryAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across all users.
    pub async fn len(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AuditLogStore for InMemoryAuditStore {
    async fn query(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SecurityEvent>, AuditStoreError> {
        let events = self.events.read().await;
        Ok(events
            .get(&user_id)
            .map(|evs| {
                evs.iter()
                    .filter(|e| e.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, event: SecurityEvent) -> Result<(), AuditStoreError> {
        let mut events = self.events.write().await;
        events.entry(event.user_id).or_default().push(event);
        Ok(())
    }
}
