//! Password hashing with bcrypt.
//!
//! Both operations are CPU-bound and run on tokio's blocking pool. Verification never errors: a malformed stored hash is just a mismatch.
//!
//! bcrypt only reads the first 72 bytes of its input. Longer passwords are
//! refused on hashing and never verify, so two passwords sharing a 72-byte
//! prefix cannot stand in for each other.

use anyhow::{Context, Result, anyhow};

pub const DEFAULT_COST: u32 = 14;

/// Longest password bcrypt can hash without truncating it.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

// Mirrors bcrypt's private MIN_COST / MAX_COST bounds.
const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// # Errors
    /// Returns an error if `cost` is outside bcrypt's supported range.
    pub fn new(cost: u32) -> Result<Self> {
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&cost) {
            return Err(anyhow!(
                "bcrypt cost must be between {} and {}, got {cost}",
                BCRYPT_MIN_COST,
                BCRYPT_MAX_COST
            ));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Produce a salted bcrypt hash for `password`.
    ///
    /// # Errors
    /// Returns an error if the password exceeds [`MAX_PASSWORD_BYTES`] or the
    /// blocking task fails.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let cost = self.cost;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::non_truncating_hash(password, cost))
            .await
            .context("password hashing task failed")?
            .context("failed to hash password")
    }

    /// Check `password` against a stored hash.
    pub async fn verify(&self, password: &str, hash: &str) -> bool {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::non_truncating_verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}
