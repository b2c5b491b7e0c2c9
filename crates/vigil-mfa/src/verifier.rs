//! MFA verification and enrollment orchestration.
//!
//! [`MfaVerifier`] wires the persistence store, the attempt counter, the
//! audit log and the SMS provider together. Verification never returns a
//! hard error for a wrong code: every attempt resolves to an
//! [`MfaVerificationResult`] so callers branch on one shape, and only the
//! collaborator outages surface as `service_unavailable`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vigil_core::{AuditLogStore, EventSeverity, SecurityEvent, UserId};

use crate::backup::{
    generate_backup_codes, hash_code, is_valid_backup_code_format, is_valid_numeric_code_format,
};
use crate::error::{MfaError, SmsDispatchError};
use crate::method::{MfaMethod, MfaMethodType};
use crate::policy::MfaPolicy;
use crate::rate_limit::{RateLimitKey, RateLimitStore};
use crate::store::{MfaStore, PendingSmsCode};
use crate::totp;

/// Event type recorded on successful verification.
pub const EVENT_MFA_VERIFIED: &str = "mfa_verified";
/// Event type recorded on each failed attempt.
pub const EVENT_MFA_FAILED: &str = "mfa_verification_failed";
/// Event type recorded when a failed attempt triggers a lockout.
pub const EVENT_MFA_LOCKOUT: &str = "mfa_lockout";
/// Event type recorded when a method is disabled.
pub const EVENT_MFA_DISABLED: &str = "mfa_method_disabled";

/// Why a verification attempt did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaFailure {
    /// The code was well-formed but wrong, expired, or already used.
    InvalidCode,
    /// The (user, method) pair is locked out.
    LockedOut,
    /// The user has no enrollment for the requested method.
    NotEnrolled,
    /// A collaborator was unreachable; the attempt was not evaluated.
    ServiceUnavailable,
    /// The submitted text is not shaped like a code for this method.
    InvalidFormat,
    /// The method type is not supported by this verifier.
    Unsupported,
}

/// Outcome of one verification attempt.
///
/// `success` means the attempt was fully evaluated; `verified` means the
/// code was correct. A locked-out attempt is evaluated (`success`) but
/// never verified, and the submitted code is not consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaVerificationResult {
    pub success: bool,
    pub verified: bool,
    /// Attempts left before lockout, when an attempt was charged.
    pub remaining_attempts: Option<u32>,
    pub failure: Option<MfaFailure>,
}

impl MfaVerificationResult {
    fn verified() -> Self {
        Self {
            success: true,
            verified: true,
            remaining_attempts: None,
            failure: None,
        }
    }

    fn rejected(failure: MfaFailure, remaining_attempts: Option<u32>) -> Self {
        Self {
            success: true,
            verified: false,
            remaining_attempts,
            failure: Some(failure),
        }
    }

    fn unavailable() -> Self {
        Self {
            success: false,
            verified: false,
            remaining_attempts: None,
            failure: Some(MfaFailure::ServiceUnavailable),
        }
    }
}

/// Material handed to the user exactly once at TOTP enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpEnrollment {
    pub secret_base32: String,
    pub otpauth_uri: String,
    pub backup_codes: Vec<String>,
}

/// Snapshot of a user's MFA posture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaStatus {
    pub mfa_enabled: bool,
    pub methods: Vec<MfaMethod>,
    pub backup_codes_remaining: usize,
}

/// Contract for the outbound SMS provider.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver a one-time code to the user's enrolled phone number.
    async fn send_code(&self, user_id: UserId, code: &str) -> Result<(), SmsDispatchError>;
}

/// MFA enrollment and verification service.
pub struct MfaVerifier {
    store: Arc<dyn MfaStore>,
    rate_limits: Arc<dyn RateLimitStore>,
    audit: Arc<dyn AuditLogStore>,
    sms: Arc<dyn SmsSender>,
    policy: MfaPolicy,
}

impl MfaVerifier {
    /// Build a verifier. Fails only on an invalid policy.
    pub fn new(
        store: Arc<dyn MfaStore>,
        rate_limits: Arc<dyn RateLimitStore>,
        audit: Arc<dyn AuditLogStore>,
        sms: Arc<dyn SmsSender>,
        policy: MfaPolicy,
    ) -> Result<Self, MfaError> {
        policy.validate()?;
        Ok(Self {
            store,
            rate_limits,
            audit,
            sms,
            policy,
        })
    }

    #[must_use]
    pub fn policy(&self) -> &MfaPolicy {
        &self.policy
    }

    /// Verify a submitted code against the current clock.
    pub async fn verify(
        &self,
        user_id: UserId,
        method: MfaMethodType,
        code: &str,
    ) -> MfaVerificationResult {
        self.verify_at(user_id, method, code, Utc::now()).await
    }

    /// Verify a submitted code at an explicit instant.
    ///
    /// Order matters: format screening first (no attempt charged), then
    /// the lockout gate, then the method-specific comparison. A failure
    /// past the gate always charges exactly one attempt.
    pub async fn verify_at(
        &self,
        user_id: UserId,
        method: MfaMethodType,
        code: &str,
        now: DateTime<Utc>,
    ) -> MfaVerificationResult {
        let well_formed = match method {
            MfaMethodType::Totp | MfaMethodType::Sms => is_valid_numeric_code_format(code),
            MfaMethodType::BackupCodes => is_valid_backup_code_format(code),
            MfaMethodType::Hardware => {
                return MfaVerificationResult::rejected(MfaFailure::Unsupported, None);
            }
        };
        if !well_formed {
            return MfaVerificationResult::rejected(MfaFailure::InvalidFormat, None);
        }

        let key = RateLimitKey { user_id, method };
        let state = match self.rate_limits.state(&key, now).await {
            Ok(state) => state,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "rate limit state unavailable");
                return MfaVerificationResult::unavailable();
            }
        };
        if state.is_locked(now) {
            return MfaVerificationResult::rejected(MfaFailure::LockedOut, Some(0));
        }

        let matched = match self.evaluate_code(user_id, method, code, now).await {
            Ok(CodeOutcome::Matched) => true,
            Ok(CodeOutcome::Mismatched) => false,
            Ok(CodeOutcome::NotEnrolled) => {
                return MfaVerificationResult::rejected(MfaFailure::NotEnrolled, None);
            }
            Err(err) => {
                warn!(user_id = %user_id, method = %method, error = %err, "mfa collaborator unavailable");
                return MfaVerificationResult::unavailable();
            }
        };

        if matched {
            if let Err(err) = self.rate_limits.reset(&key).await {
                warn!(user_id = %user_id, error = %err, "failed to reset attempt counter");
            }
            info!(user_id = %user_id, method = %method, "mfa verification succeeded");
            self.emit(
                user_id,
                EVENT_MFA_VERIFIED,
                EventSeverity::Low,
                serde_json::json!({ "method": method.to_string() }),
            )
            .await;
            return MfaVerificationResult::verified();
        }

        // Charging the attempt must go through even when the comparison
        // already failed; a recording outage fails closed.
        let state = match self.rate_limits.record_failure(&key, now).await {
            Ok(state) => state,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to record mfa attempt");
                return MfaVerificationResult::unavailable();
            }
        };
        let remaining = self.policy.max_attempts.saturating_sub(state.attempt_count);

        self.emit(
            user_id,
            EVENT_MFA_FAILED,
            EventSeverity::Low,
            serde_json::json!({
                "method": method.to_string(),
                "remaining_attempts": remaining,
            }),
        )
        .await;

        if state.is_locked(now) {
            warn!(user_id = %user_id, method = %method, "mfa lockout triggered");
            self.emit(
                user_id,
                EVENT_MFA_LOCKOUT,
                EventSeverity::Medium,
                serde_json::json!({
                    "method": method.to_string(),
                    "locked_until": state.locked_until,
                }),
            )
            .await;
        }

        MfaVerificationResult::rejected(MfaFailure::InvalidCode, Some(remaining))
    }

    async fn evaluate_code(
        &self,
        user_id: UserId,
        method: MfaMethodType,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<CodeOutcome, MfaError> {
        match method {
            MfaMethodType::Totp => {
                let Some(secret) = self.store.totp_secret(user_id).await? else {
                    return Ok(CodeOutcome::NotEnrolled);
                };
                let unix_time = now.timestamp().max(0) as u64;
                if totp::verify_code_at(&secret, code, unix_time)? {
                    Ok(CodeOutcome::Matched)
                } else {
                    Ok(CodeOutcome::Mismatched)
                }
            }
            MfaMethodType::Sms => {
                // No pending code reads as a plain mismatch so callers
                // cannot probe whether a code was ever dispatched.
                let Some(pending) = self.store.sms_code(user_id).await? else {
                    return Ok(CodeOutcome::Mismatched);
                };
                if now - pending.sent_at > self.policy.sms_code_ttl {
                    self.store.clear_sms_code(user_id).await?;
                    return Ok(CodeOutcome::Mismatched);
                }
                if hash_code(code) == pending.code_hash {
                    self.store.clear_sms_code(user_id).await?;
                    Ok(CodeOutcome::Matched)
                } else {
                    Ok(CodeOutcome::Mismatched)
                }
            }
            MfaMethodType::BackupCodes => {
                if self
                    .store
                    .consume_backup_code(user_id, &hash_code(code))
                    .await?
                {
                    Ok(CodeOutcome::Matched)
                } else {
                    Ok(CodeOutcome::Mismatched)
                }
            }
            MfaMethodType::Hardware => Ok(CodeOutcome::Mismatched),
        }
    }

    /// Enroll TOTP: generates the shared secret and a fresh backup code
    /// set, and returns the one-time enrollment material. Does not touch
    /// attempt counters.
    pub async fn setup_totp(&self, user_id: UserId) -> Result<TotpEnrollment, MfaError> {
        let secret = totp::generate_secret();
        let uri = totp::otpauth_uri(&self.policy.issuer, &user_id.to_string(), &secret);
        let (codes, hashes) = generate_backup_codes();

        self.store.set_totp_secret(user_id, secret.clone()).await?;
        self.store
            .upsert_method(user_id, MfaMethod::enrolled(MfaMethodType::Totp, true))
            .await?;
        self.store.replace_backup_codes(user_id, hashes).await?;
        self.store
            .upsert_method(
                user_id,
                MfaMethod::enrolled(MfaMethodType::BackupCodes, false),
            )
            .await?;

        info!(user_id = %user_id, "totp enrollment created");
        Ok(TotpEnrollment {
            secret_base32: secret,
            otpauth_uri: uri,
            backup_codes: codes,
        })
    }

    /// Enroll SMS: dispatches a fresh six-digit code through the provider
    /// and stores only its hash. Does not touch attempt counters.
    pub async fn setup_sms(&self, user_id: UserId) -> Result<(), MfaError> {
        let code = generate_sms_code();
        self.sms.send_code(user_id, &code).await?;
        self.store
            .set_sms_code(
                user_id,
                PendingSmsCode {
                    code_hash: hash_code(&code),
                    sent_at: Utc::now(),
                },
            )
            .await?;
        self.store
            .upsert_method(user_id, MfaMethod::enrolled(MfaMethodType::Sms, false))
            .await?;
        info!(user_id = %user_id, "sms code dispatched");
        Ok(())
    }

    /// Disable a method without re-verification. The record is retained
    /// for audit purposes.
    pub async fn disable(&self, user_id: UserId, method: MfaMethodType) -> Result<(), MfaError> {
        let existed = self.store.disable_method(user_id, method).await?;
        if !existed {
            return Err(MfaError::NotEnrolled(method.to_string()));
        }
        self.emit(
            user_id,
            EVENT_MFA_DISABLED,
            EventSeverity::Low,
            serde_json::json!({ "method": method.to_string() }),
        )
        .await;
        Ok(())
    }

    /// Replace the user's backup codes with a fresh set, invalidating any
    /// unused codes from the previous set.
    pub async fn regenerate_backup_codes(
        &self,
        user_id: UserId,
    ) -> Result<Vec<String>, MfaError> {
        let (codes, hashes) = generate_backup_codes();
        self.store.replace_backup_codes(user_id, hashes).await?;
        self.store
            .upsert_method(
                user_id,
                MfaMethod::enrolled(MfaMethodType::BackupCodes, false),
            )
            .await?;
        info!(user_id = %user_id, "backup codes regenerated");
        Ok(codes)
    }

    /// The user's current MFA posture.
    pub async fn status(&self, user_id: UserId) -> Result<MfaStatus, MfaError> {
        let methods = self.store.list_methods(user_id).await?;
        let backup_codes_remaining = self.store.backup_codes_remaining(user_id).await?;
        Ok(MfaStatus {
            mfa_enabled: methods.iter().any(|m| m.enabled),
            methods,
            backup_codes_remaining,
        })
    }

    /// Append an audit event; append failures never block verification.
    async fn emit(
        &self,
        user_id: UserId,
        event_type: &str,
        severity: EventSeverity,
        details: serde_json::Value,
    ) {
        let event = SecurityEvent::new(user_id, event_type, severity, details);
        if let Err(err) = self.audit.append(event).await {
            warn!(user_id = %user_id, event_type, error = %err, "failed to append audit event");
        }
    }
}

enum CodeOutcome {
    Matched,
    Mismatched,
    NotEnrolled,
}

/// A six-digit code drawn from the operating system CSPRNG.
fn generate_sms_code() -> String {
    use rand::rngs::OsRng;
    use rand::Rng;
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}
