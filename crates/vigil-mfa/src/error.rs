//! Error types for MFA setup and verification.

use thiserror::Error;

/// Failure talking to the MFA persistence collaborator.
#[derive(Debug, Clone, Error)]
#[error("mfa store unavailable: {0}")]
pub struct MfaStoreError(pub String);

/// Failure dispatching an SMS code through the provider collaborator.
#[derive(Debug, Clone, Error)]
#[error("sms dispatch failed: {0}")]
pub struct SmsDispatchError(pub String);

/// Errors surfaced by setup and administrative operations.
///
/// Verification itself reports failures through
/// [`crate::verifier::MfaVerificationResult`] so callers branch on one
/// shape; this enum covers the operations where a hard error is the
/// right answer.
#[derive(Debug, Error)]
pub enum MfaError {
    /// Policy values are invalid. Fatal at construction time.
    #[error("invalid mfa policy: {0}")]
    Configuration(String),

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] MfaStoreError),

    /// The SMS provider failed to dispatch a code.
    #[error(transparent)]
    SmsDispatch(#[from] SmsDispatchError),

    /// The user has no enrollment for the requested method.
    #[error("method not enrolled: {0}")]
    NotEnrolled(String),

    /// Internal secret handling failed.
    #[error("internal: {0}")]
    Internal(String),
}
