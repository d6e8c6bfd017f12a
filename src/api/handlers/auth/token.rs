//! Session token issuance and verification (HS256 JWT).
//!
//! Tokens are signed with a process-wide HMAC secret handed in at startup.
//! Each secret carries a key id written to the JWT `kid` header so a secret can
//! be rotated: the new key signs, the previous key keeps verifying until it is
//! removed from configuration.
//!
//! Verification order matters and is fixed:
//! 1. shape (three dot-separated parts) -> [`TokenError::MissingToken`]
//! 2. header, key lookup and signature -> [`TokenError::InvalidSignature`]
//! 3. expiry (no leeway) -> [`TokenError::Expired`]

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

use super::role::Role;

/// Absolute lifetime of a session token.
pub const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no signing secret configured")]
    MissingSecret,
    #[error("authorization token missing or malformed")]
    MissingToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Claims embedded in every session token.
///
/// Built from the identity at issuance and never refreshed: a role or
/// department change only shows up in tokens issued afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub department: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn new(
        user_id: i64,
        username: impl Into<String>,
        role: Role,
        department: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
            department: department.into(),
            iat: now,
            exp: now + SESSION_TTL_SECONDS,
        }
    }
}

#[derive(Clone)]
struct KeyVersion {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyVersion {
    fn new(kid: String, secret: &SecretString) -> Result<Self, TokenError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.is_empty() || kid.trim().is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            kid,
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    current: KeyVersion,
    previous: Option<KeyVersion>,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("current_kid", &self.current.kid)
            .field(
                "previous_kid",
                &self.previous.as_ref().map(|key| key.kid.as_str()),
            )
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    /// # Errors
    /// Returns [`TokenError::MissingSecret`] if the secret or key id is empty.
    pub fn new(kid: impl Into<String>, secret: &SecretString) -> Result<Self, TokenError> {
        Ok(Self {
            current: KeyVersion::new(kid.into(), secret)?,
            previous: None,
        })
    }

    /// Keep accepting tokens signed by a retired key.
    ///
    /// # Errors
    /// Returns [`TokenError::MissingSecret`] if the secret or key id is empty.
    pub fn with_previous(
        mut self,
        kid: impl Into<String>,
        secret: &SecretString,
    ) -> Result<Self, TokenError> {
        self.previous = Some(KeyVersion::new(kid.into(), secret)?);
        Ok(self)
    }

    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.current.kid
    }

    /// Sign `claims` with the current key.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.current.kid.clone());
        encode(&header, claims, &self.current.encoding).map_err(TokenError::Signing)
    }

    /// Verify `token` against the wall clock.
    ///
    /// # Errors
    /// See [`SessionKeys::verify_at`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify `token` as of `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::MissingToken`] for a malformed token,
    /// [`TokenError::InvalidSignature`] for an unknown key or bad signature,
    /// and [`TokenError::Expired`] once `exp` is reached.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() || token.split('.').count() != 3 {
            return Err(TokenError::MissingToken);
        }

        let header = decode_header(token).map_err(|_| TokenError::InvalidSignature)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::InvalidSignature);
        }
        let key = self.key_for(header.kid.as_deref())?;

        // Expiry is checked below against `now` so callers control the clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn key_for(&self, kid: Option<&str>) -> Result<&KeyVersion, TokenError> {
        let Some(kid) = kid else {
            return Ok(&self.current);
        };
        if kid == self.current.kid {
            return Ok(&self.current);
        }
        match &self.previous {
            Some(previous) if previous.kid == kid => Ok(previous),
            _ => Err(TokenError::InvalidSignature),
        }
    }
}
