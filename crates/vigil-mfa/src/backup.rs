//! Backup code generation and hashing.
//!
//! Codes are 8 uppercase alphanumeric characters, issued in sets of ten.
//! Only SHA-256 hashes are handed to the store; plaintext is shown to the
//! user exactly once at generation time.

use sha2::{Digest, Sha256};

/// Number of backup codes per set.
pub const BACKUP_CODE_COUNT: usize = 10;

/// Length of each backup code.
pub const BACKUP_CODE_LENGTH: usize = 8;

/// Generate a fresh set of backup codes.
///
/// Returns `(plaintext_codes, hashes)` in matching order. Uses the
/// operating system CSPRNG directly.
#[must_use]
pub fn generate_backup_codes() -> (Vec<String>, Vec<String>) {
    use rand::distributions::Alphanumeric;
    use rand::rngs::OsRng;
    use rand::Rng;

    let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
    let mut hashes = Vec::with_capacity(BACKUP_CODE_COUNT);

    for _ in 0..BACKUP_CODE_COUNT {
        let code: String = (0..BACKUP_CODE_LENGTH)
            .map(|_| OsRng.sample(Alphanumeric) as char)
            .collect::<String>()
            .to_uppercase();

        hashes.push(hash_code(&code));
        codes.push(code);
    }

    (codes, hashes)
}

/// SHA-256 hash of a code, hex-encoded.
#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether the submitted text is shaped like a backup code
/// (`^[A-Z0-9]{8}$`).
#[must_use]
pub fn is_valid_backup_code_format(code: &str) -> bool {
    code.len() == BACKUP_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Whether the submitted text is shaped like a 6-digit SMS/TOTP code
/// (`^\d{6}$`).
#[must_use]
pub fn is_valid_numeric_code_format(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}
