//! bcrypt password hashing and verification.

use anyhow::{Context, Result};
use tracing::{error, warn};
use ulid::Ulid;

pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Check a plaintext candidate against a stored bcrypt hash.
///
/// A malformed hash verifies as `false`.
#[must_use]
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    match bcrypt::verify(candidate, stored_hash) {
        Ok(matches) => matches,
        Err(err) => {
            warn!("Stored password hash is unusable: {err}");
            false
        }
    }
}

/// Hash a plaintext password for storage.
///
/// # Errors
/// Returns an error if `cost` is outside the range bcrypt accepts.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plaintext, cost).context("failed to hash password")
}

/// Runs bcrypt off the async executor and keeps unknown-user lookups as slow
/// as wrong-password ones.
#[derive(Clone, Debug)]
pub struct PasswordVerifier {
    dummy_hash: String,
}

impl PasswordVerifier {
    /// # Errors
    /// Returns an error if `cost` is outside the range bcrypt accepts.
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash = hash_password(&Ulid::new().to_string(), cost)?;
        Ok(Self { dummy_hash })
    }

    /// `stored_hash` is `None` when the user does not exist; the candidate is
    /// then checked against a throwaway hash and the result is always `false`.
    pub async fn check(&self, stored_hash: Option<&str>, candidate: &str) -> bool {
        let known = stored_hash.is_some();
        let hash = stored_hash.unwrap_or(&self.dummy_hash).to_string();
        let candidate = candidate.to_string();

        match tokio::task::spawn_blocking(move || verify_password(&hash, &candidate)).await {
            Ok(matches) => known && matches,
            Err(err) => {
                error!("Password verification task failed: {err}");
                false
            }
        }
    }
}
