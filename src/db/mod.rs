//! SQLite pool, schema bootstrap and first-run seeding.

use anyhow::{Context, Result, bail};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, time::Duration};
use tracing::{Instrument, debug, info, info_span};

use crate::api::handlers::auth::{
    PasswordHasher,
    password::MAX_PASSWORD_BYTES,
    role::Role,
    storage::{self, CreateOutcome},
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Department given to a seeded administrator.
pub const ADMIN_DEPARTMENT: &str = "Administration";

/// Open the pool and make sure the schema exists.
///
/// # Errors
/// Returns an error if the DSN is invalid, the database cannot be opened or
/// the schema cannot be applied.
pub async fn connect(dsn: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(dsn)
        .with_context(|| format!("Invalid database DSN: {dsn}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    ensure_parent_dir(options.get_filename())?;

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await?;

    Ok(pool)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.as_os_str() == ":memory:" {
        return Ok(());
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// Apply `sql/schema.sql`; every statement is idempotent.
///
/// # Errors
/// Returns an error naming the failing statement.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        let span = info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "DDL",
            db.statement = statement.as_str()
        );
        sqlx::query(statement)
            .execute(pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    debug!("Schema applied");
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Create the administrator unless the username is already taken.
///
/// Returns `true` when a new identity was inserted.
///
/// # Errors
/// Returns an error if the password is longer than bcrypt accepts, or if
/// hashing or the insert fails.
pub async fn seed_admin(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<bool> {
    if password.len() > MAX_PASSWORD_BYTES {
        bail!("administrator password must be at most {MAX_PASSWORD_BYTES} bytes");
    }
    if storage::username_exists(pool, username).await? {
        debug!("Administrator {username} already exists");
        return Ok(false);
    }

    let hash = hasher.hash(password).await?;
    match storage::insert_identity(pool, username, &hash, Role::Admin, Some(ADMIN_DEPARTMENT))
        .await?
    {
        CreateOutcome::Created(identity) => {
            info!("Seeded administrator {} (id {})", identity.username, identity.id);
            Ok(true)
        }
        CreateOutcome::Conflict => Ok(false),
    }
}

/// Number of stored users and tasks.
///
/// # Errors
/// Returns an error if the count query fails.
pub async fn counts(pool: &SqlitePool) -> Result<(i64, i64)> {
    let query = "SELECT (SELECT COUNT(*) FROM users) AS users, (SELECT COUNT(*) FROM tasks) AS tasks";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count rows")?;
    Ok((row.get("users"), row.get("tasks")))
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    apply_schema(&pool).await?;
    Ok(pool)
}
