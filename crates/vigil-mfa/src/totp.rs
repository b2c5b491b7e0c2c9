//! TOTP secret generation and time-window-tolerant verification.

use data_encoding::BASE32;
use totp_rs::{Algorithm, TOTP};

use crate::error::MfaError;
use crate::policy::{TOTP_DIGITS, TOTP_SKEW, TOTP_STEP_SECS};

/// TOTP secret length in bytes (160 bits, 32 base32 characters).
const TOTP_SECRET_LENGTH: usize = 20;

/// Generate a new shared secret as a 32-character base32 string.
///
/// Uses the operating system CSPRNG directly.
#[must_use]
pub fn generate_secret() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut secret = [0u8; TOTP_SECRET_LENGTH];
    OsRng.fill_bytes(&mut secret);
    BASE32.encode(&secret)
}

/// Build the otpauth URI handed to authenticator apps:
/// `otpauth://totp/<issuer>:<account>?secret=<secret>&issuer=<issuer>`.
#[must_use]
pub fn otpauth_uri(issuer: &str, account: &str, secret_base32: &str) -> String {
    format!("otpauth://totp/{issuer}:{account}?secret={secret_base32}&issuer={issuer}")
}

fn totp_instance(secret_base32: &str) -> Result<TOTP, MfaError> {
    let secret = BASE32
        .decode(secret_base32.as_bytes())
        .map_err(|e| MfaError::Internal(format!("secret decode failed: {e}")))?;
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP_SECS,
        secret,
        None,          // issuer not needed for code math
        String::new(), // account not needed for code math
    )
    .map_err(|e| MfaError::Internal(format!("totp construction failed: {e}")))
}

/// Verify a code at an explicit unix time, accepting the current step and
/// one adjacent step on either side for clock skew.
pub fn verify_code_at(secret_base32: &str, code: &str, unix_time: u64) -> Result<bool, MfaError> {
    Ok(totp_instance(secret_base32)?.check(code, unix_time))
}

/// Generate the expected code for an explicit unix time.
pub fn generate_code_at(secret_base32: &str, unix_time: u64) -> Result<String, MfaError> {
    Ok(totp_instance(secret_base32)?.generate(unix_time))
}
