//! Error types for the risk engine.

use thiserror::Error;

/// Errors surfaced by the risk engine.
///
/// Per-signal failures are absorbed at their call sites and degrade the
/// corresponding sub-score to neutral; only configuration problems at
/// construction time are fatal.
#[derive(Debug, Clone, Error)]
pub enum RiskError {
    /// Policy weights or thresholds are invalid. Fatal at startup.
    #[error("invalid risk policy: {0}")]
    Configuration(String),
}
