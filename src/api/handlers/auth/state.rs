//! Auth configuration and the immutable state built from it at startup.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::fmt;

use super::{
    password::{DEFAULT_COST, PasswordHasher},
    token::SessionKeys,
};

const DEFAULT_KEY_ID: &str = "1";

#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    jwt_key_id: String,
    jwt_previous: Option<(String, SecretString)>,
    bcrypt_cost: u32,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("jwt_key_id", &self.jwt_key_id)
            .field(
                "jwt_previous_key_id",
                &self.jwt_previous.as_ref().map(|(kid, _)| kid.as_str()),
            )
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            jwt_key_id: DEFAULT_KEY_ID.to_string(),
            jwt_previous: None,
            bcrypt_cost: DEFAULT_COST,
        }
    }

    #[must_use]
    pub fn with_jwt_key_id(mut self, kid: String) -> Self {
        self.jwt_key_id = kid;
        self
    }

    #[must_use]
    pub fn with_jwt_previous(mut self, kid: String, secret: SecretString) -> Self {
        self.jwt_previous = Some((kid, secret));
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn jwt_key_id(&self) -> &str {
        &self.jwt_key_id
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

/// Read-only after startup; shared by every request behind an `Arc`.
#[derive(Debug)]
pub struct AuthState {
    keys: SessionKeys,
    hasher: PasswordHasher,
}

impl AuthState {
    /// Build session keys and the password hasher.
    ///
    /// # Errors
    /// Fails if no signing secret is configured or the bcrypt cost is invalid.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let mut keys = SessionKeys::new(config.jwt_key_id.clone(), &config.jwt_secret)
            .context("JWT signing secret is required")?;
        if let Some((kid, secret)) = &config.jwt_previous {
            keys = keys
                .with_previous(kid.clone(), secret)
                .context("Invalid previous JWT signing secret")?;
        }
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        Ok(Self { keys, hasher })
    }

    #[must_use]
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_fails_startup() {
        let config = AuthConfig::new(SecretString::from(String::new()));
        let result = AuthState::from_config(&config);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("JWT signing secret is required"));
        }
    }

    #[test]
    fn builds_with_rotation_and_cost() -> Result<()> {
        let config = AuthConfig::new(SecretString::from("new".to_string()))
            .with_jwt_key_id("2".to_string())
            .with_jwt_previous("1".to_string(), SecretString::from("old".to_string()))
            .with_bcrypt_cost(4);
        let state = AuthState::from_config(&config)?;
        assert_eq!(state.keys().current_kid(), "2");
        assert_eq!(state.hasher().cost(), 4);
        Ok(())
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AuthConfig::new(SecretString::from("hunter2".to_string()));
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
