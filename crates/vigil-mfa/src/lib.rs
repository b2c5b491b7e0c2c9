//! Multi-factor verification core.
//!
//! Supports TOTP (RFC 6238, six digits, 30-second steps, one step of
//! clock skew), SMS one-time codes and single-use backup codes, with a
//! shared per-(user, method) attempt counter that locks a pair out after
//! repeated failures. All collaborators are injected behind async traits
//! so the core stays storage- and provider-agnostic.

pub mod backup;
pub mod error;
pub mod method;
pub mod policy;
pub mod rate_limit;
pub mod store;
pub mod totp;
pub mod verifier;

pub use error::{MfaError, MfaStoreError, SmsDispatchError};
pub use method::{MfaMethod, MfaMethodType};
pub use policy::MfaPolicy;
pub use rate_limit::{InMemoryRateLimitStore, RateLimitKey, RateLimitState, RateLimitStore};
pub use store::{InMemoryMfaStore, MfaStore, PendingSmsCode};
pub use verifier::{
    MfaFailure, MfaStatus, MfaVerificationResult, MfaVerifier, SmsSender, TotpEnrollment,
};
