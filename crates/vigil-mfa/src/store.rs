//! Persistence contract for enrollments, secrets and code hashes.
//!
//! Everything credential-shaped that crosses this boundary is already
//! hashed except the TOTP secret, which the verifier needs back in full
//! to run the code math. `consume_backup_code` must check-and-remove in
//! one step so a code can never verify twice under concurrent attempts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use vigil_core::UserId;

use crate::error::MfaStoreError;
use crate::method::{MfaMethod, MfaMethodType};

/// A dispatched SMS code awaiting verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSmsCode {
    /// SHA-256 hex hash of the dispatched code.
    pub code_hash: String,
    /// When the code was handed to the SMS provider.
    pub sent_at: DateTime<Utc>,
}

/// Contract for the MFA persistence backend.
#[async_trait]
pub trait MfaStore: Send + Sync {
    /// All method records for a user, enabled or not.
    async fn list_methods(&self, user_id: UserId) -> Result<Vec<MfaMethod>, MfaStoreError>;

    /// Insert a method record, or re-enable and replace an existing record
    /// of the same type.
    async fn upsert_method(
        &self,
        user_id: UserId,
        method: MfaMethod,
    ) -> Result<(), MfaStoreError>;

    /// Disable a method. Returns whether a record of that type existed.
    async fn disable_method(
        &self,
        user_id: UserId,
        method_type: MfaMethodType,
    ) -> Result<bool, MfaStoreError>;

    /// The user's TOTP shared secret, if enrolled.
    async fn totp_secret(&self, user_id: UserId) -> Result<Option<String>, MfaStoreError>;

    /// Store the TOTP shared secret.
    async fn set_totp_secret(
        &self,
        user_id: UserId,
        secret_base32: String,
    ) -> Result<(), MfaStoreError>;

    /// Record a freshly dispatched SMS code, replacing any earlier one.
    async fn set_sms_code(
        &self,
        user_id: UserId,
        pending: PendingSmsCode,
    ) -> Result<(), MfaStoreError>;

    /// The most recently dispatched SMS code still awaiting verification.
    async fn sms_code(&self, user_id: UserId) -> Result<Option<PendingSmsCode>, MfaStoreError>;

    /// Drop the pending SMS code after successful verification or expiry.
    async fn clear_sms_code(&self, user_id: UserId) -> Result<(), MfaStoreError>;

    /// Replace the user's backup code hashes with a new set.
    async fn replace_backup_codes(
        &self,
        user_id: UserId,
        hashes: Vec<String>,
    ) -> Result<(), MfaStoreError>;

    /// Atomically consume a backup code by hash. Returns `true` when the
    /// hash matched an unused code, which is removed in the same step.
    async fn consume_backup_code(
        &self,
        user_id: UserId,
        code_hash: &str,
    ) -> Result<bool, MfaStoreError>;

    /// How many unused backup codes remain.
    async fn backup_codes_remaining(&self, user_id: UserId) -> Result<usize, MfaStoreError>;
}

#[derive(Debug, Default)]
struct UserRecord {
    methods: Vec<MfaMethod>,
    totp_secret: Option<String>,
    sms_code: Option<PendingSmsCode>,
    backup_code_hashes: Vec<String>,
}

/// In-process reference implementation backed by a mutexed map.
#[derive(Default)]
pub struct InMemoryMfaStore {
    users: Mutex<HashMap<UserId, UserRecord>>,
}

impl InMemoryMfaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MfaStore for InMemoryMfaStore {
    async fn list_methods(&self, user_id: UserId) -> Result<Vec<MfaMethod>, MfaStoreError> {
        let users = self.users.lock();
        Ok(users
            .get(&user_id)
            .map(|record| record.methods.clone())
            .unwrap_or_default())
    }

    async fn upsert_method(
        &self,
        user_id: UserId,
        method: MfaMethod,
    ) -> Result<(), MfaStoreError> {
        let mut users = self.users.lock();
        let record = users.entry(user_id).or_default();
        record
            .methods
            .retain(|existing| existing.method_type != method.method_type);
        record.methods.push(method);
        Ok(())
    }

    async fn disable_method(
        &self,
        user_id: UserId,
        method_type: MfaMethodType,
    ) -> Result<bool, MfaStoreError> {
        let mut users = self.users.lock();
        let Some(record) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        let mut found = false;
        for method in &mut record.methods {
            if method.method_type == method_type {
                method.enabled = false;
                found = true;
            }
        }
        Ok(found)
    }

    async fn totp_secret(&self, user_id: UserId) -> Result<Option<String>, MfaStoreError> {
        let users = self.users.lock();
        Ok(users.get(&user_id).and_then(|r| r.totp_secret.clone()))
    }

    async fn set_totp_secret(
        &self,
        user_id: UserId,
        secret_base32: String,
    ) -> Result<(), MfaStoreError> {
        let mut users = self.users.lock();
        users.entry(user_id).or_default().totp_secret = Some(secret_base32);
        Ok(())
    }

    async fn set_sms_code(
        &self,
        user_id: UserId,
        pending: PendingSmsCode,
    ) -> Result<(), MfaStoreError> {
        let mut users = self.users.lock();
        users.entry(user_id).or_default().sms_code = Some(pending);
        Ok(())
    }

    async fn sms_code(&self, user_id: UserId) -> Result<Option<PendingSmsCode>, MfaStoreError> {
        let users = self.users.lock();
        Ok(users.get(&user_id).and_then(|r| r.sms_code.clone()))
    }

    async fn clear_sms_code(&self, user_id: UserId) -> Result<(), MfaStoreError> {
        let mut users = self.users.lock();
        if let Some(record) = users.get_mut(&user_id) {
            record.sms_code = None;
        }
        Ok(())
    }

    async fn replace_backup_codes(
        &self,
        user_id: UserId,
        hashes: Vec<String>,
    ) -> Result<(), MfaStoreError> {
        let mut users = self.users.lock();
        users.entry(user_id).or_default().backup_code_hashes = hashes;
        Ok(())
    }

    async fn consume_backup_code(
        &self,
        user_id: UserId,
        code_hash: &str,
    ) -> Result<bool, MfaStoreError> {
        let mut users = self.users.lock();
        let Some(record) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = record.backup_code_hashes.len();
        record.backup_code_hashes.retain(|hash| hash != code_hash);
        Ok(record.backup_code_hashes.len() < before)
    }

    async fn backup_codes_remaining(&self, user_id: UserId) -> Result<usize, MfaStoreError> {
        let users = self.users.lock();
        Ok(users
            .get(&user_id)
            .map(|r| r.backup_code_hashes.len())
            .unwrap_or(0))
    }
}
