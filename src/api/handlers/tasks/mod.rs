//! Task endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via bearer token.
//! 2) Derive the caller's [`TaskScope`] from the role.
//! 3) List within the scope, or check the target task's owner against it
//!    before updating or deleting.

pub(crate) mod storage;
pub(crate) mod types;

use axum::{
    Json,
    extract::{
        Extension, Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

use self::types::{MessageResponse, Task, TaskFields, TaskRequest};
use super::{
    auth::{
        AuthState, Principal,
        principal::require_auth,
        role::Permission,
        scope::{MutationDecision, TaskScope},
    },
    error::{ErrorBody, ServiceError},
    json_body, path_id,
};

const INVALID_TASK_ID: &str = "Invalid task ID";

#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Tasks visible to the caller, newest first.", body = [Task]),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<Task>>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::TasksRead)?;

    let tasks = storage::list_tasks(&pool, &principal.task_scope()).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task created and owned by the caller.", body = Task),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
#[instrument(skip(headers, pool, auth, payload))]
pub async fn create_task(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::TasksWrite)?;
    let fields = TaskFields::try_from(json_body(payload)?)?;

    let id = storage::insert_task(&pool, principal.user_id, &fields).await?;
    let task = storage::fetch_task(&pool, id)
        .await?
        .ok_or(ServiceError::NotFound("Task not found"))?;

    debug!("Created task {id} for user {}", principal.user_id);
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(
        ("id" = i64, Path, description = "Task id")
    ),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated.", body = Task),
        (status = 400, description = "Invalid task id or input.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Task outside the caller's scope.", body = ErrorBody),
        (status = 404, description = "Task not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
#[instrument(skip(path, headers, pool, auth, payload))]
pub async fn update_task(
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::TasksWrite)?;
    let id = path_id(path, INVALID_TASK_ID)?;
    authorize_mutation(&pool, &principal, id).await?;
    let fields = TaskFields::try_from(json_body(payload)?)?;

    if !storage::update_task(&pool, id, &fields).await? {
        return Err(ServiceError::NotFound("Task not found"));
    }
    let task = storage::fetch_task(&pool, id)
        .await?
        .ok_or(ServiceError::NotFound("Task not found"))?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(
        ("id" = i64, Path, description = "Task id")
    ),
    responses(
        (status = 200, description = "Task deleted.", body = MessageResponse),
        (status = 400, description = "Invalid task id.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Task outside the caller's scope.", body = ErrorBody),
        (status = 404, description = "Task not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
#[instrument(skip(path, headers, pool, auth))]
pub async fn delete_task(
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::TasksWrite)?;
    let id = path_id(path, INVALID_TASK_ID)?;
    authorize_mutation(&pool, &principal, id).await?;

    if !storage::delete_task(&pool, id).await? {
        return Err(ServiceError::NotFound("Task not found"));
    }
    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

async fn authorize_mutation(
    pool: &SqlitePool,
    principal: &Principal,
    id: i64,
) -> Result<(), ServiceError> {
    let scope: TaskScope = principal.task_scope();
    let owner = storage::task_owner(pool, id).await?;
    match scope.decide_mutation(owner.as_ref()) {
        MutationDecision::Allowed => Ok(()),
        MutationDecision::Denied => Err(ServiceError::AccessDenied("Access denied")),
        MutationDecision::NotFound => Err(ServiceError::NotFound("Task not found")),
    }
}
