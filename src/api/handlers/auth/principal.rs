//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the bearer token from the `Authorization` header,
//! verify it with the configured session keys, and return a principal built
//! from its claims. Nothing is read from storage here; the claims are trusted
//! until they expire.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use super::{
    role::{Permission, Role},
    scope::TaskScope,
    state::AuthState,
    token::{SessionClaims, TokenError},
};
use crate::api::handlers::error::ServiceError;

/// Authenticated caller context derived from a verified session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub department: String,
    pub expires_at: i64,
}

impl From<SessionClaims> for Principal {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
            department: claims.department,
            expires_at: claims.exp,
        }
    }
}

impl Principal {
    #[must_use]
    pub const fn allows(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }

    #[must_use]
    pub fn task_scope(&self) -> TaskScope {
        TaskScope::for_role(self.role, self.user_id, &self.department)
    }

    /// # Errors
    /// Returns [`ServiceError::AccessDenied`] if the role lacks `permission`.
    pub fn ensure(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.allows(permission) {
            return Ok(());
        }
        let message = match permission {
            Permission::ReportsDepartment => "Manager or admin access required",
            _ => "Admin access required",
        };
        Err(ServiceError::AccessDenied(message))
    }
}

/// Extract the raw token from `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token into a principal, or fail with a 401 error.
///
/// # Errors
/// Returns [`ServiceError::Token`] when the header is missing or the token
/// does not verify.
pub fn require_auth(headers: &HeaderMap, auth: &AuthState) -> Result<Principal, ServiceError> {
    let token = bearer_token(headers).ok_or(TokenError::MissingToken)?;
    let claims = auth.keys().verify(token)?;
    Ok(Principal::from(claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use secrecy::SecretString;

    fn state() -> anyhow::Result<AuthState> {
        AuthState::from_config(
            &AuthConfig::new(SecretString::from("principal-secret".to_string()))
                .with_bcrypt_cost(4),
        )
    }

    fn headers(value: &str) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    #[test]
    fn bearer_scheme_is_required() -> anyhow::Result<()> {
        assert_eq!(bearer_token(&headers("Bearer abc")?), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")?), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")?), None);
        assert_eq!(bearer_token(&headers("Bearer ")?), None);
        assert_eq!(bearer_token(&headers("abc")?), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        Ok(())
    }

    #[test]
    fn missing_header_is_missing_token() -> anyhow::Result<()> {
        let state = state()?;
        let result = require_auth(&HeaderMap::new(), &state);
        assert!(matches!(
            result,
            Err(ServiceError::Token(TokenError::MissingToken))
        ));
        Ok(())
    }

    #[test]
    fn verified_token_yields_principal() -> anyhow::Result<()> {
        let state = state()?;
        let now = Utc::now().timestamp();
        let claims = SessionClaims::new(3, "carol", Role::Manager, "Eng", now);
        let token = state.keys().issue(&claims)?;
        let principal = require_auth(&headers(&format!("Bearer {token}"))?, &state)?;
        assert_eq!(principal.username, "carol");
        assert_eq!(principal.expires_at, claims.exp);
        assert_eq!(
            principal.task_scope(),
            TaskScope::Department("Eng".to_string())
        );
        Ok(())
    }

    #[test]
    fn ensure_reports_required_role() {
        let principal = Principal {
            user_id: 1,
            username: "u".to_string(),
            role: Role::User,
            department: "Eng".to_string(),
            expires_at: 0,
        };
        assert!(principal.ensure(Permission::TasksWrite).is_ok());
        match principal.ensure(Permission::ReportsDepartment) {
            Err(ServiceError::AccessDenied(message)) => {
                assert_eq!(message, "Manager or admin access required");
            }
            other => panic!("unexpected: {other:?}"),
        }
        match principal.ensure(Permission::UsersDelete) {
            Err(ServiceError::AccessDenied(message)) => {
                assert_eq!(message, "Admin access required");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
