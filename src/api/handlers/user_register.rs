use crate::api::handlers::{
    auth::{
        AuthState,
        password::MAX_PASSWORD_BYTES,
        role::Role,
        storage::{self, CreateOutcome},
        token::SessionClaims,
        types::{AuthResponse, RegisterRequest, UserInfo},
    },
    error::{ErrorBody, ServiceError},
    json_body, normalize_department, valid_username,
};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; returns a session token", body = AuthResponse),
        (status = 400, description = "Invalid input or username already taken", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(pool, auth, payload))]
pub async fn register(
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ServiceError> {
    let request = json_body(payload)?;
    let username = request.username.trim();

    if !valid_username(username) {
        return Err(ServiceError::validation("Invalid username"));
    }
    if request.password.is_empty() {
        return Err(ServiceError::validation("Password is required"));
    }
    if request.password.len() > MAX_PASSWORD_BYTES {
        return Err(ServiceError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    let department = normalize_department(&request.department)?;

    if storage::username_exists(&pool, username).await? {
        debug!("Username {username} already exists");
        return Err(ServiceError::validation("Username already exists"));
    }

    let hash = auth.hasher().hash(&request.password).await?;

    // New accounts always start with the least privileged role.
    let identity =
        match storage::insert_identity(&pool, username, &hash, Role::User, Some(&department))
            .await?
        {
            CreateOutcome::Created(identity) => identity,
            CreateOutcome::Conflict => {
                return Err(ServiceError::validation("Username already exists"));
            }
        };

    let claims = SessionClaims::new(
        identity.id,
        identity.username.as_str(),
        identity.role,
        identity.department_claim(),
        Utc::now().timestamp(),
    );
    let token = auth.keys().issue(&claims)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            token,
            user: UserInfo::from(&identity),
        }),
    ))
}
