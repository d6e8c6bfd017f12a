//! Admin-only user management over HTTP.

mod common;

use anyhow::{Context, Result};
use common::{PASSWORD, TestApp, error_of};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn only_admin_lists_users() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, token) = app.signup("alice", "Eng").await?;

    let response = app.get("/api/users", &token).send().await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::FORBIDDEN, "Admin access required".to_string())
    );

    let users: Vec<Value> = app
        .get("/api/users", &app.admin_token().await?)
        .send()
        .await?
        .json()
        .await?;
    let names: Vec<&str> = users
        .iter()
        .filter_map(|user| user["username"].as_str())
        .collect();
    assert_eq!(names, ["admin", "alice"]);
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[0]["department"], "Administration");
    Ok(())
}

#[tokio::test]
async fn role_and_department_updates() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.admin_token().await?;
    let (id, _) = app.signup("alice", "Eng").await?;

    let response = app
        .put(&format!("/api/users/{id}/role"), &admin)
        .json(&json!({ "role": "manager" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "User role updated successfully");

    let response = app
        .put(&format!("/api/users/{id}/role"), &admin)
        .json(&json!({ "role": "root" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put("/api/users/424242/role", &admin)
        .json(&json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::NOT_FOUND, "User not found".to_string())
    );

    let response = app
        .put(&format!("/api/users/{id}/department"), &admin)
        .json(&json!({ "department": "Sales" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(&format!("/api/users/{id}/department"), &admin)
        .json(&json!({ "department": "" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let me: Value = app
        .get("/api/me", &app.token_for("alice", PASSWORD).await?)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(me["role"], "manager");
    assert_eq!(me["department"], "Sales");
    Ok(())
}

#[tokio::test]
async fn manager_cannot_manage_users() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (id, _) = app.signup("mona", "Eng").await?;
    app.set_role(id, "manager").await?;
    let manager = app.token_for("mona", PASSWORD).await?;

    let response = app
        .put(&format!("/api/users/{id}/role"), &manager)
        .json(&json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn delete_blocked_by_owned_tasks() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.admin_token().await?;
    let (id, token) = app.signup("alice", "Eng").await?;
    let task = app.create_task(&token, "keep me").await?;

    let response = app.delete(&format!("/api/users/{id}"), &admin).send().await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Cannot delete user with existing tasks");
    assert!(body["task_count"].as_i64().context("task_count missing")? >= 1);

    let task_id = task["id"].as_i64().context("task id")?;
    let response = app
        .delete(&format!("/api/tasks/{task_id}"), &token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.delete(&format!("/api/users/{id}"), &admin).send().await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.delete(&format!("/api/users/{id}"), &admin).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admin_cannot_delete_self() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.admin_token().await?;
    let me: Value = app.get("/api/me", &admin).send().await?.json().await?;
    let id = me["id"].as_i64().context("me without id")?;

    let response = app.delete(&format!("/api/users/{id}"), &admin).send().await?;
    assert_eq!(
        error_of(response).await?,
        (
            StatusCode::FORBIDDEN,
            "Cannot delete your own account".to_string()
        )
    );
    Ok(())
}

#[tokio::test]
async fn malformed_user_id_checked_after_permissions() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, user) = app.signup("alice", "Eng").await?;

    let response = app
        .client
        .put(app.url("/api/users/xyz/role"))
        .json(&json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .put("/api/users/xyz/role", &user)
        .json(&json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::FORBIDDEN, "Admin access required".to_string())
    );

    let admin = app.admin_token().await?;
    for response in [
        app.put("/api/users/xyz/role", &admin)
            .json(&json!({ "role": "admin" }))
            .send()
            .await?,
        app.put("/api/users/xyz/department", &admin)
            .json(&json!({ "department": "Ops" }))
            .send()
            .await?,
        app.delete("/api/users/xyz", &admin).send().await?,
    ] {
        assert_eq!(
            error_of(response).await?,
            (StatusCode::BAD_REQUEST, "Invalid user ID".to_string())
        );
    }
    Ok(())
}
