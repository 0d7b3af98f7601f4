//! Password credential primitive

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{ServiceError, ServiceResult};

/// Hashes and verifies client passwords. The stored form is opaque to callers.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> ServiceResult<String>;

    /// `false` for a wrong password and for an unreadable stored hash
    fn verify(&self, plaintext: &str, stored: &str) -> bool;
}

/// Argon2id with default parameters, PHC string format
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> ServiceResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::Internal(format!("Hashing failed: {}", e)))
    }

    fn verify(&self, plaintext: &str, stored: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid stored password hash format");
                return false;
            }
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Well-formed argon2id hash no password matches. Verified against when the
/// email is unknown so a miss costs as much as a wrong password.
pub const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Hash on the blocking pool
pub async fn hash_blocking(
    hasher: Arc<dyn CredentialHasher>,
    plaintext: String,
) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
        .await
        .map_err(|e| ServiceError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Verify on the blocking pool. `None` checks against [`DUMMY_HASH`] and is
/// always `false`.
pub async fn verify_blocking(
    hasher: Arc<dyn CredentialHasher>,
    plaintext: String,
    stored: Option<String>,
) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => hasher.verify(&plaintext, &stored),
        None => {
            hasher.verify(&plaintext, DUMMY_HASH);
            false
        }
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("Verification task failed: {}", e)))
}
