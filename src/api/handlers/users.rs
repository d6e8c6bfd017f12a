//! Admin-only user management endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via bearer token.
//! 2) Require the admin permission for the operation.
//! 3) Read, update or delete the requested identity.
//!
//! Deletion refuses to remove the caller's own account and any identity that
//! still owns tasks; the conflict response carries the task count so the
//! client can tell the admin what to clean up first.

use axum::{
    Json,
    extract::{
        Extension, Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{Instrument, info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{
        AuthState,
        principal::require_auth,
        role::{Permission, Role},
    },
    error::{ErrorBody, ServiceError},
    json_body, normalize_department, path_id,
    tasks::types::MessageResponse,
};

const INVALID_USER_ID: &str = "Invalid user ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserDepartmentRequest {
    pub department: String,
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "List every user (admin-only).", body = [UserSummary]),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<UserSummary>>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::UsersRead)?;

    Ok(Json(fetch_user_summaries(&pool).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    request_body = UserRoleRequest,
    responses(
        (status = 200, description = "Role updated (admin-only).", body = MessageResponse),
        (status = 400, description = "Invalid user id or role.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(path, headers, pool, auth, payload))]
pub async fn set_user_role(
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<UserRoleRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::UsersAssignRole)?;
    let id = path_id(path, INVALID_USER_ID)?;

    let request = json_body(payload)?;
    let role = Role::parse_strict(&request.role)
        .ok_or_else(|| ServiceError::validation("Role must be one of user, manager, admin"))?;

    if !update_user_column(&pool, id, UserColumn::Role, role.as_str()).await? {
        return Err(ServiceError::NotFound("User not found"));
    }

    info!("User {id} role set to {role} by {}", principal.username);
    Ok(Json(MessageResponse {
        message: "User role updated successfully".to_string(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/department",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    request_body = UserDepartmentRequest,
    responses(
        (status = 200, description = "Department updated (admin-only).", body = MessageResponse),
        (status = 400, description = "Invalid user id or department.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(path, headers, pool, auth, payload))]
pub async fn set_user_department(
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<UserDepartmentRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::UsersAssignDepartment)?;
    let id = path_id(path, INVALID_USER_ID)?;

    let request = json_body(payload)?;
    let department = normalize_department(&request.department)?;

    if !update_user_column(&pool, id, UserColumn::Department, &department).await? {
        return Err(ServiceError::NotFound("User not found"));
    }

    info!("User {id} moved to {department} by {}", principal.username);
    Ok(Json(MessageResponse {
        message: "User department updated successfully".to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 204, description = "User deleted (admin-only)."),
        (status = 400, description = "Invalid user id.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required, or self-deletion.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
        (status = 409, description = "User still owns tasks.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(path, headers, pool, auth))]
pub async fn delete_user(
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<StatusCode, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::UsersDelete)?;
    let id = path_id(path, INVALID_USER_ID)?;

    if principal.user_id == id {
        return Err(ServiceError::AccessDenied("Cannot delete your own account"));
    }

    match delete_user_record(&pool, id).await? {
        DeleteOutcome::Deleted => {
            info!("User {id} deleted by {}", principal.username);
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(ServiceError::NotFound("User not found")),
        DeleteOutcome::OwnsTasks(count) => Err(ServiceError::Conflict {
            message: "Cannot delete user with existing tasks",
            task_count: Some(count),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserColumn {
    Role,
    Department,
}

#[derive(Debug, PartialEq, Eq)]
enum DeleteOutcome {
    Deleted,
    NotFound,
    OwnsTasks(i64),
}

async fn fetch_user_summaries(pool: &SqlitePool) -> Result<Vec<UserSummary>, sqlx::Error> {
    let query = "SELECT id, username, role, department, created_at FROM users ORDER BY id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
            role: Role::from_stored(row.get::<&str, _>("role")),
            department: row.get("department"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn update_user_column(
    pool: &SqlitePool,
    id: i64,
    column: UserColumn,
    value: &str,
) -> Result<bool, sqlx::Error> {
    let query = match column {
        UserColumn::Role => "UPDATE users SET role = ? WHERE id = ?",
        UserColumn::Department => "UPDATE users SET department = ? WHERE id = ?",
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(value)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn delete_user_record(pool: &SqlitePool, id: i64) -> Result<DeleteOutcome, sqlx::Error> {
    // Count and delete on one connection so no task can slip in between.
    let mut tx = pool.begin().await?;

    let query = r"
        SELECT
            EXISTS(SELECT 1 FROM users WHERE id = ?) AS found,
            (SELECT COUNT(*) FROM tasks WHERE user_id = ?) AS task_count
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(id)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await?;
    let found: bool = row.get("found");
    let task_count: i64 = row.get("task_count");

    if !found {
        return Ok(DeleteOutcome::NotFound);
    }
    if task_count > 0 {
        return Ok(DeleteOutcome::OwnsTasks(task_count));
    }

    let query = "DELETE FROM users WHERE id = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await?;
    tx.commit().await?;

    Ok(DeleteOutcome::Deleted)
}
