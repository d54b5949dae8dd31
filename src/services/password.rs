//! Password hashing and verification using Argon2id.
//!
//! Hashes are stored as PHC strings. An unusable password is a `!` marker
//! followed by random hex, which never parses as a PHC string and therefore
//! never verifies.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Prefix marking a password that can never match.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";
const UNUSABLE_SUFFIX_BYTES: usize = 20;

/// Hash a raw password. `None` produces an unusable password.
///
/// CPU-intensive; async callers should use [`make_password_async`].
pub fn make_password(raw_password: Option<&str>) -> AppResult<String> {
    let Some(raw) = raw_password else {
        return Ok(make_unusable_password());
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InvalidInput(format!("Failed to hash password: {}", e)))
}

/// Hash a password on the blocking pool.
pub async fn make_password_async(raw_password: Option<String>) -> AppResult<String> {
    tokio::task::spawn_blocking(move || make_password(raw_password.as_deref()))
        .await
        .map_err(|e| AppError::Database(format!("Password hashing task failed: {}", e)))?
}

pub fn make_unusable_password() -> String {
    let suffix: [u8; UNUSABLE_SUFFIX_BYTES] = rand::random();
    format!("{}{}", UNUSABLE_PASSWORD_PREFIX, hex::encode(suffix))
}

pub fn is_password_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

/// Verify a raw password against a stored hash. Unusable or malformed
/// hashes never verify.
pub fn verify_password(raw_password: &str, encoded: &str) -> bool {
    if !is_password_usable(encoded) {
        return false;
    }

    let parsed = match PasswordHash::new(encoded) {
        Ok(h) => h,
        Err(e) => {
            warn!("Failed to parse password hash: {}", e);
            return false;
        }
    };

    let ok = Argon2::default()
        .verify_password(raw_password.as_bytes(), &parsed)
        .is_ok();
    debug!(success = ok, "Password verification");
    ok
}

/// Verify a password on the blocking pool.
pub async fn verify_password_async(raw_password: String, encoded: String) -> bool {
    verification_outcome(
        tokio::task::spawn_blocking(move || verify_password(&raw_password, &encoded)).await,
    )
}

/// A verification task that died counts as a failed check, loudly.
fn verification_outcome(result: Result<bool, tokio::task::JoinError>) -> bool {
    match result {
        Ok(ok) => ok,
        Err(e) => {
            warn!("Password verification task failed: {}", e);
            false
        }
    }
}
