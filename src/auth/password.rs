//! Argon2id password hashing.
//!
//! Hashes use the `argon2` crate defaults (Argon2id, 19 MiB, 2 passes) and
//! are stored as PHC strings, so the parameters travel with the hash.

use std::sync::OnceLock;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;

/// Hashes `plain` with a fresh random salt.
///
/// # Errors
///
/// Returns [`AppError::Server`] if hashing fails.
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Server(format!("password hash failed: {e}")))
}

/// Checks `plain` against a stored PHC hash.
///
/// # Errors
///
/// Returns [`AppError::Server`] if the stored hash cannot be parsed.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Server(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs a verification against a throwaway hash so a login for an unknown
/// email costs about as much as one with a wrong password.
pub fn verify_dummy(plain: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY.get_or_init(|| hash_password("statusdesk-dummy-password").ok()) {
        let _ = verify_password(plain, hash);
    }
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
///
/// Returns [`AppError::Server`] if hashing fails or the task is lost.
pub async fn hash_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Server(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool. With no stored hash it runs
/// [`verify_dummy`] and reports a mismatch.
///
/// # Errors
///
/// Returns [`AppError::Server`] if the hash is unreadable or the task is
/// lost.
pub async fn verify_blocking(plain: String, hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&plain, &hash),
        None => {
            verify_dummy(&plain);
            Ok(false)
        }
    })
    .await
    .map_err(|e| AppError::Server(format!("verification task failed: {e}")))?
}
