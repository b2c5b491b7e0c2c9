//! MFA policy configuration.
//!
//! One injected value carrying the attempt limits, lockout duration and
//! TOTP parameters, replacing scattered magic numbers. Validated at
//! verifier construction; a bad policy never reaches request time.

use chrono::Duration;

use crate::error::MfaError;

/// Default maximum failed attempts before lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lockout duration in seconds.
pub const DEFAULT_LOCKOUT_SECS: i64 = 900;

/// Default attempt-counting window in seconds.
pub const DEFAULT_ATTEMPT_WINDOW_SECS: i64 = 300;

/// Default lifetime of a dispatched SMS code in seconds.
pub const DEFAULT_SMS_CODE_TTL_SECS: i64 = 300;

/// TOTP code length in digits.
pub const TOTP_DIGITS: usize = 6;

/// TOTP time step in seconds.
pub const TOTP_STEP_SECS: u64 = 30;

/// Accepted step tolerance on either side of the current step.
pub const TOTP_SKEW: u8 = 1;

/// Injected MFA policy.
#[derive(Debug, Clone)]
pub struct MfaPolicy {
    /// Failed attempts allowed before the (user, method) pair locks.
    pub max_attempts: u32,
    /// How long a lockout lasts once triggered.
    pub lockout_duration: Duration,
    /// Window over which failed attempts accumulate.
    pub attempt_window: Duration,
    /// Lifetime of a dispatched SMS code.
    pub sms_code_ttl: Duration,
    /// Issuer label embedded in otpauth URIs.
    pub issuer: String,
}

impl Default for MfaPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::seconds(DEFAULT_LOCKOUT_SECS),
            attempt_window: Duration::seconds(DEFAULT_ATTEMPT_WINDOW_SECS),
            sms_code_ttl: Duration::seconds(DEFAULT_SMS_CODE_TTL_SECS),
            issuer: "Vigil".to_string(),
        }
    }
}

impl MfaPolicy {
    /// Read the issuer from `MFA_ISSUER`, keeping defaults for the rest.
    #[must_use]
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Ok(issuer) = std::env::var("MFA_ISSUER") {
            policy.issuer = issuer;
        }
        policy
    }

    /// Validate the policy. Called once at verifier construction.
    pub fn validate(&self) -> Result<(), MfaError> {
        if self.max_attempts == 0 {
            return Err(MfaError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(MfaError::Configuration(
                "lockout_duration must be positive".to_string(),
            ));
        }
        if self.attempt_window <= Duration::zero() {
            return Err(MfaError::Configuration(
                "attempt_window must be positive".to_string(),
            ));
        }
        if self.issuer.is_empty() || self.issuer.contains(':') {
            return Err(MfaError::Configuration(
                "issuer must be non-empty and colon-free".to_string(),
            ));
        }
        Ok(())
    }
}
