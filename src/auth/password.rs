//! Password hashing and verification — Argon2id.
//!
//! [`hash`] generates a random salt via `OsRng` and hashes the plaintext with
//! the default memory-hard Argon2id parameters, producing a PHC-format string
//! (`$argon2id$v=19$m=19456,t=2,p=1$...`) for the `password_hash` column.
//! [`verify`] parses a stored PHC string and checks a plaintext against it,
//! returning `Ok(false)` on mismatch and `Err` only for a malformed hash.
//!
//! Plaintext passwords never leave this module and are never logged.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hashed.to_string())
}

/// Verify a password against a PHC-format hash string.
pub fn verify(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("malformed password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let stored = hash("correct horse battery staple").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify("correct horse battery staple", &stored).unwrap());
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let stored = hash("right-password").unwrap();
        assert!(!verify("wrong-password", &stored).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        // Random salt per hash.
        let a = hash("secret123").unwrap();
        let b = hash("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify("whatever", "not-a-phc-string").is_err());
    }
}
