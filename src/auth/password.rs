//! Actor passwords: signup policy and Argon2id hashes
//!
//! Farmers and collectors sign up with a phone number and a password. The
//! password must be 8 to 128 characters and is stored only as a PHC string
//! in the `password_hash` column of the actor tables.

use argon2::password_hash::{self, rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

use crate::error::LedgerError;

/// Shortest password accepted at signup
pub const MIN_PASSWORD_LEN: usize = 8;

/// Longest password accepted at signup; bounds hashing cost per request
pub const MAX_PASSWORD_LEN: usize = 128;

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Check a signup password against the length policy (counted in characters)
pub fn validate_password(password: &str) -> Result<(), LedgerError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(LedgerError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(LedgerError::InvalidInput(format!(
            "password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    if password.trim().is_empty() {
        return Err(LedgerError::InvalidInput("password must not be blank".into()));
    }
    Ok(())
}

/// Hash a password for the `password_hash` column
pub fn hash_password(password: &str) -> Result<String, LedgerError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LedgerError::Auth(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check a login attempt against a stored hash
///
/// A wrong password is `Ok(false)`; a corrupt stored hash is an error so it
/// is not mistaken for a bad login.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, LedgerError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| LedgerError::Auth(format!("Invalid password hash format: {e}")))?;

    match hasher().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LedgerError::Auth(format!("Failed to verify password: {e}"))),
    }
}
