use crate::api::handlers::{
    auth::{
        AuthState, storage,
        token::SessionClaims,
        types::{AuthResponse, LoginRequest, UserInfo},
    },
    error::{ErrorBody, ServiceError},
    json_body,
};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; returns a session token", body = AuthResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(pool, auth, payload))]
pub async fn login(
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let request = json_body(payload)?;
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(ServiceError::validation("Username and password are required"));
    }

    // Unknown users and wrong passwords get the same answer.
    let Some(identity) = storage::find_by_username(&pool, username).await? else {
        debug!("Login for unknown user");
        return Err(ServiceError::InvalidCredentials);
    };
    if !auth
        .hasher()
        .verify(&request.password, &identity.password_hash)
        .await
    {
        debug!("Login with wrong password");
        return Err(ServiceError::InvalidCredentials);
    }

    let claims = SessionClaims::new(
        identity.id,
        identity.username.as_str(),
        identity.role,
        identity.department_claim(),
        Utc::now().timestamp(),
    );
    let token = auth.keys().issue(&claims)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user: UserInfo::from(&identity),
    }))
}
