//! Argon2id password hashing
//!
//! Hashes are stored as PHC strings, so the salt and parameters travel with
//! the hash and older hashes keep verifying if the defaults change.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password with a fresh random salt.
///
/// ```ignore
/// use city_guide::services::password::hash_password;
///
/// let hash = hash_password("correct horse battery")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Check `password` against a stored PHC hash.
///
/// A wrong password is `Ok(false)`; a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}
