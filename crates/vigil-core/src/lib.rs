//! vigil core library
//!
//! Shared types for the vigil authentication core.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`UserId`, `EventId`)
//! - [`audit`] - Security event stream and the audit-log collaborator contract

pub mod audit;
pub mod ids;

pub use audit::{
    AuditLogStore, AuditStoreError, EventSeverity, InMemoryAuditStore, SecurityEvent,
};
pub use ids::{EventId, ParseIdError, UserId};
