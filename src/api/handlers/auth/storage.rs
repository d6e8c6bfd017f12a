//! Database helpers for identities.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::Instrument;

use super::role::Role;

/// Outcome when attempting to create a new identity.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Identity),
    Conflict,
}

/// Stored identity, including the password hash.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<String>,
}

impl Identity {
    fn from_row(row: &SqliteRow) -> Self {
        let role: String = row.get("role");
        Self {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            role: Role::from_stored(&role),
            department: row.get("department"),
        }
    }

    /// Department as carried in session claims (empty when unset).
    #[must_use]
    pub fn department_claim(&self) -> &str {
        self.department.as_deref().unwrap_or_default()
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Look up an identity by username (used by login).
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<Identity>> {
    let query = "SELECT id, username, password_hash, role, department FROM users WHERE username = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup identity")?;

    Ok(row.as_ref().map(Identity::from_row))
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?) AS found";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check username")?;

    Ok(row.get::<bool, _>("found"))
}

/// Insert a new identity. A unique violation on `username` is a conflict, not an error.
pub async fn insert_identity(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    role: Role,
    department: Option<&str>,
) -> Result<CreateOutcome> {
    let query = r"
        INSERT INTO users (username, password_hash, role, department)
        VALUES (?, ?, ?, ?)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(department)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match result {
        Ok(row) => Ok(CreateOutcome::Created(Identity {
            id: row.get("id"),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            department: department.map(str::to_string),
        })),
        Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert identity"),
    }
}
