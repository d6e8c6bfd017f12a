//! Shared harness for the HTTP integration suites.
//!
//! Each [`TestApp`] owns a temp-dir SQLite database, seeds the administrator,
//! and serves the real router on an ephemeral port.

#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};
use tasktrack::{
    api::{self, AppContext, AuthConfig, AuthState, BackupConfig},
    db,
};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const JWT_SECRET: &str = "integration-secret";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub pool: SqlitePool,
    pub backup_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AuthConfig::new(SecretString::from(JWT_SECRET.to_string()))).await
    }

    pub async fn spawn_with(config: AuthConfig) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let dsn = format!("sqlite://{}", dir.path().join("tasks.db").display());
        let pool = db::connect(&dsn).await?;

        let auth = Arc::new(AuthState::from_config(&config.with_bcrypt_cost(4))?);
        db::seed_admin(&pool, auth.hasher(), ADMIN_USERNAME, ADMIN_PASSWORD).await?;

        let backup_dir = dir.path().join("backups");
        let app = api::app(AppContext {
            pool: pool.clone(),
            auth,
            backup: BackupConfig::new(backup_dir.clone()),
            cors_origin: None,
        })?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            pool,
            backup_dir,
            _dir: dir,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        department: &str,
    ) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "username": username,
                "password": password,
                "department": department,
            }))
            .send()
            .await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?)
    }

    /// Register with [`PASSWORD`] and return `(user_id, token)`.
    pub async fn signup(&self, username: &str, department: &str) -> Result<(i64, String)> {
        let response = self.register(username, PASSWORD, department).await?;
        if response.status() != StatusCode::CREATED {
            bail!("register {username} failed: {}", response.status());
        }
        let body: Value = response.json().await?;
        Ok((user_id(&body)?, token(&body)?))
    }

    /// Log in and return the session token.
    pub async fn token_for(&self, username: &str, password: &str) -> Result<String> {
        let response = self.login(username, password).await?;
        if response.status() != StatusCode::OK {
            bail!("login {username} failed: {}", response.status());
        }
        token(&response.json().await?)
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.token_for(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Change a stored role directly; the caller has to log in again to see it.
    pub async fn set_role(&self, user_id: i64, role: &str) -> Result<()> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_task(&self, token: &str, title: &str) -> Result<Value> {
        let response = self
            .post("/api/tasks", token)
            .json(&json!({ "title": title, "progress": 10, "hours_per_week": 2.5 }))
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            bail!("create task {title} failed: {}", response.status());
        }
        Ok(response.json().await?)
    }

    pub async fn task_titles(&self, token: &str) -> Result<Vec<String>> {
        let response = self.get("/api/tasks", token).send().await?;
        if response.status() != StatusCode::OK {
            bail!("list tasks failed: {}", response.status());
        }
        let tasks: Vec<Value> = response.json().await?;
        tasks
            .iter()
            .map(|task| {
                task["title"]
                    .as_str()
                    .map(ToString::to_string)
                    .context("task without title")
            })
            .collect()
    }
}

pub fn token(body: &Value) -> Result<String> {
    body["token"]
        .as_str()
        .map(ToString::to_string)
        .context("response without token")
}

pub fn user_id(body: &Value) -> Result<i64> {
    body["user"]["id"].as_i64().context("response without user id")
}

pub fn task_id(task: &Value) -> Result<i64> {
    task["id"].as_i64().context("task without id")
}

/// Status plus the `error` field of a JSON error body.
pub async fn error_of(response: Response) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body: Value = response.json().await?;
    let message = body["error"]
        .as_str()
        .map(ToString::to_string)
        .context("response without error field")?;
    Ok((status, message))
}

/// Sign session claims directly, bypassing the login endpoint.
pub fn sign_claims(secret: &str, kid: &str, claims: &Value) -> Result<String> {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    Ok(encode(
        &header,
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}
