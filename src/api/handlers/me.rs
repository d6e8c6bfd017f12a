//! The caller's own session.
//!
//! Answers straight from the verified claims; nothing is read from storage, so
//! a role or department change made after login shows up only after the next
//! login.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
};
use chrono::DateTime;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{
    auth::{AuthState, principal::require_auth, role::Role},
    error::{ErrorBody, ServiceError},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub department: String,
    /// RFC 3339 expiry of the presented token.
    pub expires_at: String,
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Return the authenticated session.", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn get_me(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<MeResponse>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    let expires_at = DateTime::from_timestamp(principal.expires_at, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();

    Ok(Json(MeResponse {
        id: principal.user_id,
        username: principal.username,
        role: principal.role,
        department: principal.department,
        expires_at,
    }))
}
