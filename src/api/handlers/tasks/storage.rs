//! Database helpers for tasks.
//!
//! Every read that returns tasks goes through [`list_tasks`] or [`fetch_task`]
//! so rows always carry the owner's username and department.

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use tracing::Instrument;

use super::types::{Task, TaskFields};
use crate::api::handlers::auth::scope::{TaskOwner, TaskScope};

const TASK_SELECT: &str = r"
    SELECT t.id, t.title, t.description, t.progress, t.hours_per_week, t.load_per_month,
           t.user_id, t.created_at, t.updated_at, u.username, u.department
    FROM tasks t
    JOIN users u ON u.id = t.user_id";

fn task_from_row(row: &SqliteRow) -> Task {
    Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        progress: row.get("progress"),
        hours_per_week: row.get("hours_per_week"),
        load_per_month: row.get("load_per_month"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        department: row.get("department"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Tasks visible under `scope`, newest first.
pub async fn list_tasks(pool: &SqlitePool, scope: &TaskScope) -> Result<Vec<Task>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(TASK_SELECT);
    scope.push_filter(&mut builder);
    builder.push(" ORDER BY t.created_at DESC, t.id DESC");

    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = builder.sql()
    );
    let rows = builder.build().fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(task_from_row).collect())
}

pub async fn fetch_task(pool: &SqlitePool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    let query = format!("{TASK_SELECT} WHERE t.id = ?");
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(task_from_row))
}

/// Owner facts of a task, used to authorize update and delete.
pub async fn task_owner(pool: &SqlitePool, id: i64) -> Result<Option<TaskOwner>, sqlx::Error> {
    let query = r"
        SELECT t.user_id, u.department
        FROM tasks t
        LEFT JOIN users u ON u.id = t.user_id
        WHERE t.id = ?
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| TaskOwner {
        user_id: row.get("user_id"),
        department: row.get("department"),
    }))
}

/// Insert a task owned by `user_id` and return its id.
pub async fn insert_task(
    pool: &SqlitePool,
    user_id: i64,
    fields: &TaskFields,
) -> Result<i64, sqlx::Error> {
    let query = r"
        INSERT INTO tasks (title, description, progress, hours_per_week, load_per_month, user_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.progress)
        .bind(fields.hours_per_week)
        .bind(fields.load_per_month)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("id"))
}

/// Replace the editable fields of a task. Returns `false` if it no longer exists.
pub async fn update_task(
    pool: &SqlitePool,
    id: i64,
    fields: &TaskFields,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE tasks
        SET title = ?, description = ?, progress = ?, hours_per_week = ?, load_per_month = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.progress)
        .bind(fields.hours_per_week)
        .bind(fields.load_per_month)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_task(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM tasks WHERE id = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}
