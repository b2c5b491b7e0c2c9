//! MFA method records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The verification factor a method record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaMethodType {
    Totp,
    Sms,
    BackupCodes,
    Hardware,
}

impl std::fmt::Display for MfaMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MfaMethodType::Totp => write!(f, "totp"),
            MfaMethodType::Sms => write!(f, "sms"),
            MfaMethodType::BackupCodes => write!(f, "backup_codes"),
            MfaMethodType::Hardware => write!(f, "hardware"),
        }
    }
}

/// One enrolled verification method.
///
/// Created on setup and disabled on user request; never silently deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaMethod {
    pub id: Uuid,
    pub method_type: MfaMethodType,
    pub enabled: bool,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl MfaMethod {
    /// A freshly enrolled, enabled method.
    #[must_use]
    pub fn enrolled(method_type: MfaMethodType, is_primary: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            method_type,
            enabled: true,
            is_primary,
            created_at: Utc::now(),
        }
    }
}
