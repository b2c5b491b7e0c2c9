//! End-to-end verification flows against in-memory collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use vigil_core::{AuditLogStore, InMemoryAuditStore, UserId};
use vigil_mfa::verifier::{EVENT_MFA_LOCKOUT, EVENT_MFA_VERIFIED};
use vigil_mfa::{
    totp, InMemoryMfaStore, InMemoryRateLimitStore, MfaFailure, MfaMethod, MfaMethodType,
    MfaPolicy, MfaStore, MfaVerifier, PendingSmsCode, SmsDispatchError, SmsSender,
};

/// SMS provider double that records every dispatched code.
#[derive(Default)]
struct RecordingSms {
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send_code(&self, _user_id: UserId, code: &str) -> Result<(), SmsDispatchError> {
        self.codes.lock().push(code.to_string());
        Ok(())
    }
}

/// Persistence double where every call fails.
struct BrokenMfaStore;

#[async_trait]
impl MfaStore for BrokenMfaStore {
    async fn list_methods(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<MfaMethod>, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn upsert_method(
        &self,
        _user_id: UserId,
        _method: MfaMethod,
    ) -> Result<(), vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn disable_method(
        &self,
        _user_id: UserId,
        _method_type: MfaMethodType,
    ) -> Result<bool, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn totp_secret(
        &self,
        _user_id: UserId,
    ) -> Result<Option<String>, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn set_totp_secret(
        &self,
        _user_id: UserId,
        _secret_base32: String,
    ) -> Result<(), vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn set_sms_code(
        &self,
        _user_id: UserId,
        _pending: PendingSmsCode,
    ) -> Result<(), vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn sms_code(
        &self,
        _user_id: UserId,
    ) -> Result<Option<PendingSmsCode>, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn clear_sms_code(&self, _user_id: UserId) -> Result<(), vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn replace_backup_codes(
        &self,
        _user_id: UserId,
        _hashes: Vec<String>,
    ) -> Result<(), vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn consume_backup_code(
        &self,
        _user_id: UserId,
        _code_hash: &str,
    ) -> Result<bool, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }

    async fn backup_codes_remaining(
        &self,
        _user_id: UserId,
    ) -> Result<usize, vigil_mfa::MfaStoreError> {
        Err(vigil_mfa::MfaStoreError("down".into()))
    }
}

struct Harness {
    verifier: MfaVerifier,
    store: Arc<InMemoryMfaStore>,
    audit: Arc<InMemoryAuditStore>,
    sms: Arc<RecordingSms>,
}

fn harness() -> Harness {
    let policy = MfaPolicy::default();
    let store = Arc::new(InMemoryMfaStore::new());
    let audit = Arc::new(InMemoryAuditStore::new());
    let sms = Arc::new(RecordingSms::default());
    let verifier = MfaVerifier::new(
        store.clone(),
        Arc::new(InMemoryRateLimitStore::new(&policy)),
        audit.clone(),
        sms.clone(),
        policy,
    )
    .unwrap();
    Harness {
        verifier,
        store,
        audit,
        sms,
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

#[tokio::test]
async fn totp_enrollment_then_verification() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();
    assert_eq!(enrollment.secret_base32.len(), 32);
    assert_eq!(enrollment.backup_codes.len(), 10);
    assert!(enrollment
        .otpauth_uri
        .starts_with(&format!("otpauth://totp/Vigil:{user}?secret=")));

    let code =
        totp::generate_code_at(&enrollment.secret_base32, now.timestamp() as u64).unwrap();
    let result = h.verifier.verify_at(user, MfaMethodType::Totp, &code, now).await;
    assert!(result.verified);
    assert!(result.failure.is_none());

    let since = now - Duration::hours(1);
    let events = h.audit.query(user, since).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == EVENT_MFA_VERIFIED));

    let status = h.verifier.status(user).await.unwrap();
    assert!(status.mfa_enabled);
    assert_eq!(status.backup_codes_remaining, 10);
    assert_eq!(status.methods.len(), 2);
}

#[tokio::test]
async fn three_failures_lock_the_method_out() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();

    let r1 = h
        .verifier
        .verify_at(user, MfaMethodType::Totp, "000000", now)
        .await;
    assert_eq!(r1.failure, Some(MfaFailure::InvalidCode));
    assert_eq!(r1.remaining_attempts, Some(2));

    h.verifier
        .verify_at(user, MfaMethodType::Totp, "000000", now)
        .await;
    let r3 = h
        .verifier
        .verify_at(user, MfaMethodType::Totp, "000000", now)
        .await;
    assert_eq!(r3.remaining_attempts, Some(0));

    // Even the correct code is rejected and not consumed while locked.
    let code =
        totp::generate_code_at(&enrollment.secret_base32, now.timestamp() as u64).unwrap();
    let locked = h.verifier.verify_at(user, MfaMethodType::Totp, &code, now).await;
    assert!(!locked.verified);
    assert_eq!(locked.failure, Some(MfaFailure::LockedOut));
    assert_eq!(locked.remaining_attempts, Some(0));

    let events = h.audit.query(user, now - Duration::hours(1)).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == EVENT_MFA_LOCKOUT));
}

#[tokio::test]
async fn lockout_expires_without_a_background_task() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();
    for _ in 0..3 {
        h.verifier
            .verify_at(user, MfaMethodType::Totp, "000000", now)
            .await;
    }

    let after = now + Duration::seconds(900);
    let code =
        totp::generate_code_at(&enrollment.secret_base32, after.timestamp() as u64).unwrap();
    let result = h
        .verifier
        .verify_at(user, MfaMethodType::Totp, &code, after)
        .await;
    assert!(result.verified);
}

#[tokio::test]
async fn backup_code_verifies_exactly_once() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();
    let code = enrollment.backup_codes[0].clone();

    let first = h
        .verifier
        .verify_at(user, MfaMethodType::BackupCodes, &code, now)
        .await;
    assert!(first.verified);
    assert_eq!(h.verifier.status(user).await.unwrap().backup_codes_remaining, 9);

    let second = h
        .verifier
        .verify_at(user, MfaMethodType::BackupCodes, &code, now)
        .await;
    assert!(!second.verified);
    assert_eq!(second.failure, Some(MfaFailure::InvalidCode));
}

#[tokio::test]
async fn sms_code_is_single_use() {
    let h = harness();
    let user = UserId::new();

    h.verifier.setup_sms(user).await.unwrap();
    let code = h.sms.codes.lock().last().cloned().unwrap();

    let first = h.verifier.verify(user, MfaMethodType::Sms, &code).await;
    assert!(first.verified);

    let replay = h.verifier.verify(user, MfaMethodType::Sms, &code).await;
    assert!(!replay.verified);
    assert_eq!(replay.failure, Some(MfaFailure::InvalidCode));
}

#[tokio::test]
async fn sms_code_expires_after_ttl() {
    let h = harness();
    let user = UserId::new();

    h.verifier.setup_sms(user).await.unwrap();
    let code = h.sms.codes.lock().last().cloned().unwrap();

    let stale = Utc::now() + Duration::seconds(301);
    let result = h.verifier.verify_at(user, MfaMethodType::Sms, &code, stale).await;
    assert!(!result.verified);
    assert_eq!(result.failure, Some(MfaFailure::InvalidCode));

    // The expired code is dropped, not kept around.
    assert!(h.store.sms_code(user).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_codes_do_not_consume_attempts() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();

    for bad in ["12345", "12345a", "", "123456789"] {
        let result = h.verifier.verify_at(user, MfaMethodType::Totp, bad, now).await;
        assert_eq!(result.failure, Some(MfaFailure::InvalidFormat));
        assert_eq!(result.remaining_attempts, None);
    }

    let code =
        totp::generate_code_at(&enrollment.secret_base32, now.timestamp() as u64).unwrap();
    let result = h.verifier.verify_at(user, MfaMethodType::Totp, &code, now).await;
    assert!(result.verified);
}

#[tokio::test]
async fn unenrolled_method_reports_not_enrolled() {
    let h = harness();
    let user = UserId::new();

    let result = h.verifier.verify(user, MfaMethodType::Totp, "123456").await;
    assert!(!result.verified);
    assert_eq!(result.failure, Some(MfaFailure::NotEnrolled));
    assert_eq!(result.remaining_attempts, None);
}

#[tokio::test]
async fn hardware_method_is_unsupported() {
    let h = harness();
    let user = UserId::new();

    let result = h
        .verifier
        .verify(user, MfaMethodType::Hardware, "123456")
        .await;
    assert!(!result.verified);
    assert_eq!(result.failure, Some(MfaFailure::Unsupported));
}

#[tokio::test]
async fn store_outage_reports_service_unavailable() {
    let policy = MfaPolicy::default();
    let verifier = MfaVerifier::new(
        Arc::new(BrokenMfaStore),
        Arc::new(InMemoryRateLimitStore::new(&policy)),
        Arc::new(InMemoryAuditStore::new()),
        Arc::new(RecordingSms::default()),
        policy,
    )
    .unwrap();
    let user = UserId::new();

    let result = verifier.verify(user, MfaMethodType::Totp, "123456").await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(MfaFailure::ServiceUnavailable));
}

#[tokio::test]
async fn disable_retains_the_method_record() {
    let h = harness();
    let user = UserId::new();

    h.verifier.setup_totp(user).await.unwrap();
    h.verifier.disable(user, MfaMethodType::Totp).await.unwrap();

    let status = h.verifier.status(user).await.unwrap();
    let totp_method = status
        .methods
        .iter()
        .find(|m| m.method_type == MfaMethodType::Totp)
        .unwrap();
    assert!(!totp_method.enabled);

    // Disabling something never enrolled is an error.
    assert!(h.verifier.disable(user, MfaMethodType::Sms).await.is_err());
}

#[tokio::test]
async fn regenerated_backup_codes_invalidate_the_old_set() {
    let h = harness();
    let user = UserId::new();
    let now = fixed_now();

    let enrollment = h.verifier.setup_totp(user).await.unwrap();
    let old_code = enrollment.backup_codes[0].clone();

    let fresh = h.verifier.regenerate_backup_codes(user).await.unwrap();
    assert_eq!(fresh.len(), 10);

    let stale = h
        .verifier
        .verify_at(user, MfaMethodType::BackupCodes, &old_code, now)
        .await;
    assert!(!stale.verified);

    let new = h
        .verifier
        .verify_at(user, MfaMethodType::BackupCodes, &fresh[0], now)
        .await;
    assert!(new.verified);
}
