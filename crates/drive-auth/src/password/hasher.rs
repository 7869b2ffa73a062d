//! Argon2id password hashing and verification.

use std::sync::{Arc, OnceLock};

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as ArgonHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use drive_core::error::AppError;
use drive_core::result::AppResult;

/// Hashes and verifies account passwords with Argon2id.
///
/// Stored hashes are PHC strings, so parameters travel with each hash.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    /// Hash compared against when the account does not exist, so a failed
    /// login costs the same whether or not the username is known.
    /// Computed on first use.
    decoy: Arc<OnceLock<String>>,
}

impl PasswordHasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes a plaintext password with a fresh random salt.
    pub fn hash(&self, password: &str) -> AppResult<String> {
        Self::digest(password)
    }

    /// Checks a plaintext password against a stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("Stored password hash is malformed: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!("Password verification failed: {e}"))),
        }
    }

    /// Burns one verification for a login whose username matched nobody.
    pub fn verify_absent(&self, password: &str) {
        let decoy = self
            .decoy
            .get_or_init(|| Self::digest("decoy-password").unwrap_or_default());
        let _ = self.verify(password, decoy);
    }

    fn digest(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }
}
