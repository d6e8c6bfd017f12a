//! Health check for tasktrack.
//!
//! `GET /health` returns build info plus database status as JSON; `OPTIONS
//! /health` answers the same status with an empty body. Both carry an `X-App`
//! header (`name:version:short-hash`).

use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqlitePool};
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info_span};
use utoipa::ToSchema;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

async fn database_healthy(pool: &SqlitePool) -> bool {
    let ping = async {
        let acquire_span = info_span!("db.acquire", db.system = "sqlite", db.operation = "ACQUIRE");
        let mut conn = pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "sqlite", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok::<(), sqlx::Error>(())
    };

    match timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), ping).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!("Failed to ping database: {err}");
            false
        }
        Err(_) => {
            error!("Database ping timed out after {HEALTH_DB_TIMEOUT_SECONDS}s");
            false
        }
    }
}

fn x_app_header(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(0..7).unwrap_or_default();
    format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new())
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
pub async fn health(method: Method, pool: Extension<SqlitePool>) -> impl IntoResponse {
    let db_healthy = database_healthy(&pool.0).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let headers = x_app_header(&health);
    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    if db_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_app_header_uses_short_hash() {
        let health = Health {
            commit: "0123456789abcdef".to_string(),
            name: "tasktrack".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };
        let headers = x_app_header(&health);
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("tasktrack:0.1.0:0123456")
        );
    }

    #[tokio::test]
    async fn healthy_pool_reports_ok() -> anyhow::Result<()> {
        let pool = crate::db::memory_pool().await?;
        assert!(database_healthy(&pool).await);
        pool.close().await;
        assert!(!database_healthy(&pool).await);
        Ok(())
    }
}
