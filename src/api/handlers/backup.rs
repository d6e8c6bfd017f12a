//! Database backup download and restore upload (admin-only).
//!
//! Flow Overview:
//! 1) Backup: `VACUUM INTO` a scratch file and stream it back as a download.
//! 2) Restore: validate the upload, snapshot the live database into the backup
//!    directory, attach the upload on one pooled connection and replace every
//!    user and task inside a single transaction.
//!
//! The live database file is never swapped underneath the pool, so open
//! connections stay valid after a restore.

use anyhow::Context;
use axum::{
    Json,
    extract::{Extension, Multipart, multipart::MultipartRejection},
    http::{
        HeaderMap,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sqlx::{Connection, Row, SqliteConnection, SqlitePool};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{Instrument, info, info_span, instrument, warn};

use super::{
    auth::{AuthState, principal::require_auth, role::Permission},
    error::{ErrorBody, ServiceError},
    tasks::types::MessageResponse,
};

/// Leading bytes of every SQLite 3 database file.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

const UPLOAD_FIELD: &str = "database";
const ATTACHED_SCHEMA: &str = "restore_source";

/// Where safety snapshots are written before a restore.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    dir: PathBuf,
}

impl BackupConfig {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

async fn vacuum_into(pool: &SqlitePool, target: &Path) -> Result<(), sqlx::Error> {
    let query = "VACUUM INTO ?";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "VACUUM",
        db.statement = query
    );
    sqlx::query(query)
        .bind(target.to_string_lossy().into_owned())
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/backup",
    responses(
        (status = 200, description = "Consistent snapshot of the database (admin-only).", content_type = "application/octet-stream"),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "backup"
)]
#[instrument(skip(headers, pool, auth))]
pub async fn backup(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Response, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::Backup)?;

    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let snapshot = scratch.path().join("snapshot.db");
    vacuum_into(&pool, &snapshot).await?;
    let bytes = tokio::fs::read(&snapshot)
        .await
        .context("failed to read database snapshot")?;

    let file_name = format!("backup_{}.db", timestamp());
    info!("Backup {file_name} ({} bytes) requested by {}", bytes.len(), principal.username);

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={file_name}")),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/restore",
    request_body(content_type = "multipart/form-data", description = "SQLite `.db` file in the `database` field"),
    responses(
        (status = 200, description = "Database restored (admin-only).", body = MessageResponse),
        (status = 400, description = "Missing, misnamed or invalid database file.", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "backup"
)]
#[instrument(skip(headers, pool, auth, backup_config, multipart))]
pub async fn restore(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
    backup_config: Extension<BackupConfig>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let principal = require_auth(&headers, &auth)?;
    principal.ensure(Permission::Backup)?;

    let upload = read_upload(multipart).await?;
    validate_upload(&upload)?;

    let safety = safety_snapshot(&pool, backup_config.dir()).await?;
    info!("Saved pre-restore snapshot to {}", safety.display());

    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let source = scratch.path().join("restore.db");
    tokio::fs::write(&source, &upload.bytes)
        .await
        .context("failed to stage uploaded database")?;

    let mut conn = pool.acquire().await?;
    restore_from_file(&mut conn, &source).await?;

    info!("Database restored from {} by {}", upload.file_name, principal.username);
    Ok(Json(MessageResponse {
        message: "Database restored successfully".to_string(),
    }))
}

#[derive(Debug)]
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ServiceError> {
    let no_file = || ServiceError::validation("No file provided");
    let mut multipart = multipart.map_err(|_| no_file())?;

    while let Some(field) = multipart.next_field().await.map_err(|_| no_file())? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServiceError::validation(err.body_text()))?;
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(no_file())
}

fn validate_upload(upload: &Upload) -> Result<(), ServiceError> {
    let is_db = Path::new(&upload.file_name)
        .extension()
        .is_some_and(|ext| ext == "db");
    if !is_db {
        return Err(ServiceError::validation("Only .db files are allowed"));
    }
    if !upload.bytes.starts_with(SQLITE_MAGIC) {
        return Err(ServiceError::validation("File is not a SQLite database"));
    }
    Ok(())
}

async fn safety_snapshot(pool: &SqlitePool, dir: &Path) -> Result<PathBuf, ServiceError> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create backup directory {}", dir.display()))?;

    let mut target = dir.join(format!("backup_before_restore_{}.db", timestamp()));
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        // Two restores within the same second.
        target = dir.join(format!(
            "backup_before_restore_{}_{}.db",
            timestamp(),
            ulid::Ulid::new()
        ));
    }
    vacuum_into(pool, &target).await?;
    Ok(target)
}

/// Attach `source`, replace users and tasks from it, and always detach.
async fn restore_from_file(conn: &mut SqliteConnection, source: &Path) -> Result<(), ServiceError> {
    sqlx::query(&format!("ATTACH DATABASE ? AS {ATTACHED_SCHEMA}"))
        .bind(source.to_string_lossy().into_owned())
        .execute(&mut *conn)
        .await
        .map_err(|err| {
            warn!("Failed to attach uploaded database: {err}");
            ServiceError::validation("File is not a SQLite database")
        })?;

    let result = replace_rows(conn).await;

    if let Err(err) = sqlx::query(&format!("DETACH DATABASE {ATTACHED_SCHEMA}"))
        .execute(&mut *conn)
        .await
    {
        warn!("Failed to detach restore source: {err}");
    }

    result
}

async fn replace_rows(conn: &mut SqliteConnection) -> Result<(), ServiceError> {
    let tables: i64 = sqlx::query(&format!(
        "SELECT COUNT(*) AS found FROM {ATTACHED_SCHEMA}.sqlite_master \
         WHERE type = 'table' AND name IN ('users', 'tasks')"
    ))
    .fetch_one(&mut *conn)
    .await
    .map_err(|_| ServiceError::validation("File is not a SQLite database"))?
    .get("found");
    if tables != 2 {
        return Err(ServiceError::validation(
            "Backup must contain users and tasks tables",
        ));
    }

    let mut tx = conn.begin().await?;
    match copy_rows(&mut tx).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Failed to roll back restore: {rollback}");
            }
            Err(restore_error(err))
        }
    }
}

async fn copy_rows(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statements = [
        "DELETE FROM tasks".to_string(),
        "DELETE FROM users".to_string(),
        format!(
            "INSERT INTO users (id, username, password_hash, role, department, created_at) \
             SELECT id, username, password_hash, COALESCE(role, 'user'), department, \
                    COALESCE(created_at, CURRENT_TIMESTAMP) \
             FROM {ATTACHED_SCHEMA}.users"
        ),
        format!(
            "INSERT INTO tasks (id, title, description, progress, hours_per_week, load_per_month, \
                                user_id, created_at, updated_at) \
             SELECT id, title, COALESCE(description, ''), COALESCE(progress, 0), \
                    COALESCE(hours_per_week, 0), COALESCE(load_per_month, 0), user_id, \
                    COALESCE(created_at, CURRENT_TIMESTAMP), COALESCE(updated_at, CURRENT_TIMESTAMP) \
             FROM {ATTACHED_SCHEMA}.tasks"
        ),
    ];

    for statement in &statements {
        let span = info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "RESTORE",
            db.statement = statement.as_str()
        );
        sqlx::query(statement)
            .execute(&mut *conn)
            .instrument(span)
            .await?;
    }
    Ok(())
}

/// Constraint failures mean the uploaded data is bad, not that we are.
fn restore_error(err: sqlx::Error) -> ServiceError {
    match &err {
        sqlx::Error::Database(db_err)
            if db_err.is_check_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_unique_violation() =>
        {
            ServiceError::validation("Backup data violates database constraints")
        }
        _ => ServiceError::Persistence(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use anyhow::Result;

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn upload_needs_db_extension_and_magic() {
        let mut valid = SQLITE_MAGIC.to_vec();
        valid.extend_from_slice(&[0; 16]);
        assert!(validate_upload(&upload("tasks.db", &valid)).is_ok());
        assert!(validate_upload(&upload("tasks.sqlite", &valid)).is_err());
        assert!(validate_upload(&upload("", &valid)).is_err());
        assert!(validate_upload(&upload("tasks.db", b"not a database")).is_err());
    }

    #[test]
    fn backup_file_names_use_timestamp_format() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), "2024-01-02_03-04-05".len());
        assert_eq!(stamp.as_bytes()[10], b'_');
    }

    async fn seeded(path: &Path, users: &[(&str, &str)]) -> Result<SqlitePool> {
        let pool = db::connect(&format!("sqlite://{}", path.display())).await?;
        for (username, department) in users {
            sqlx::query("INSERT INTO users (username, password_hash, department) VALUES (?, 'h', ?)")
                .bind(username)
                .bind(department)
                .execute(&pool)
                .await?;
        }
        Ok(pool)
    }

    #[tokio::test]
    async fn restore_replaces_rows_and_keeps_snapshot() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let live = seeded(&dir.path().join("live.db"), &[("old", "Eng")]).await?;
        let other = seeded(&dir.path().join("other.db"), &[("new1", "Ops"), ("new2", "Ops")]).await?;
        sqlx::query("INSERT INTO tasks (title, user_id) VALUES ('restored', 1)")
            .execute(&other)
            .await?;

        let source = dir.path().join("source.db");
        vacuum_into(&other, &source).await?;

        let backups = dir.path().join("backups");
        let safety = safety_snapshot(&live, &backups).await?;
        assert!(safety.exists());

        let mut conn = live.acquire().await?;
        restore_from_file(&mut conn, &source).await?;
        drop(conn);

        let names: Vec<String> = sqlx::query_scalar("SELECT username FROM users ORDER BY id")
            .fetch_all(&live)
            .await?;
        assert_eq!(names, vec!["new1".to_string(), "new2".to_string()]);
        assert_eq!(db::counts(&live).await?, (2, 1));

        // The connection is usable again once the source is detached.
        let mut conn = live.acquire().await?;
        restore_from_file(&mut conn, &source).await?;
        Ok(())
    }

    #[tokio::test]
    async fn restore_rejects_foreign_schema() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let live = seeded(&dir.path().join("live.db"), &[("keep", "Eng")]).await?;

        let foreign_path = dir.path().join("foreign.db");
        let foreign = db::connect(&format!("sqlite://{}", foreign_path.display())).await?;
        sqlx::query("DROP TABLE tasks").execute(&foreign).await?;
        foreign.close().await;

        let mut conn = live.acquire().await?;
        let result = restore_from_file(&mut conn, &foreign_path).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        drop(conn);

        assert_eq!(db::counts(&live).await?, (1, 0));
        Ok(())
    }
}
