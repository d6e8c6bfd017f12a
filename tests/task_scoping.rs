//! Task visibility and mutation rules per role.

mod common;

use anyhow::Result;
use common::{PASSWORD, TestApp, error_of, task_id};
use reqwest::StatusCode;
use serde_json::{Value, json};

struct Org {
    user_token: String,
    manager_token: String,
    admin_token: String,
    outsider_token: String,
}

/// alice (user, Eng), mona (manager, Eng), olaf (user, Ops) and the admin,
/// each owning one task named after them.
async fn org(app: &TestApp) -> Result<Org> {
    let (_, user_token) = app.signup("alice", "Eng").await?;
    let (mona, _) = app.signup("mona", "Eng").await?;
    let (_, outsider_token) = app.signup("olaf", "Ops").await?;
    app.set_role(mona, "manager").await?;
    let manager_token = app.token_for("mona", PASSWORD).await?;
    let admin_token = app.admin_token().await?;

    app.create_task(&user_token, "alice-task").await?;
    app.create_task(&manager_token, "mona-task").await?;
    app.create_task(&outsider_token, "olaf-task").await?;
    app.create_task(&admin_token, "admin-task").await?;

    Ok(Org {
        user_token,
        manager_token,
        admin_token,
        outsider_token,
    })
}

fn sorted(mut titles: Vec<String>) -> Vec<String> {
    titles.sort();
    titles
}

#[tokio::test]
async fn listings_follow_role_scope() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = org(&app).await?;

    assert_eq!(app.task_titles(&org.user_token).await?, ["alice-task"]);
    assert_eq!(
        sorted(app.task_titles(&org.manager_token).await?),
        ["alice-task", "mona-task"]
    );
    assert_eq!(app.task_titles(&org.outsider_token).await?, ["olaf-task"]);
    assert_eq!(
        app.task_titles(&org.admin_token).await?,
        ["admin-task", "olaf-task", "mona-task", "alice-task"]
    );
    Ok(())
}

#[tokio::test]
async fn created_task_belongs_to_caller() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (id, token) = app.signup("alice", "Eng").await?;

    let task = app.create_task(&token, "write docs").await?;
    assert_eq!(task["user_id"], id);
    assert_eq!(task["username"], "alice");
    assert_eq!(task["department"], "Eng");
    assert_eq!(task["progress"], 10);
    assert_eq!(task["description"], "");
    Ok(())
}

#[tokio::test]
async fn invalid_task_fields_are_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, token) = app.signup("alice", "Eng").await?;

    for body in [
        json!({ "title": "t", "progress": 101 }),
        json!({ "title": "t", "load_per_month": 101 }),
        json!({ "title": "t", "hours_per_week": -1.0 }),
        json!({ "title": "   " }),
        json!({ "description": "no title" }),
    ] {
        let response = app.post("/api/tasks", &token).json(&body).send().await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
    Ok(())
}

#[tokio::test]
async fn user_cannot_touch_foreign_or_missing_tasks() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = org(&app).await?;
    let (_, other) = app.signup("ann", "Eng").await?;
    let task = app.create_task(&other, "ann-task").await?;
    let id = task_id(&task)?;

    let response = app
        .put(&format!("/api/tasks/{id}"), &org.user_token)
        .json(&json!({ "title": "hijacked" }))
        .send()
        .await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::FORBIDDEN, "Access denied".to_string())
    );

    let response = app.delete("/api/tasks/999999", &org.user_token).send().await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.delete("/api/tasks/999999", &org.admin_token).send().await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::NOT_FOUND, "Task not found".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn manager_edits_within_department_only() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = org(&app).await?;
    let alice_task = app.create_task(&org.user_token, "second").await?;
    let olaf_task = app.create_task(&org.outsider_token, "ops-work").await?;

    let response = app
        .put(&format!("/api/tasks/{}", task_id(&alice_task)?), &org.manager_token)
        .json(&json!({ "title": "reviewed", "progress": 100 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["title"], "reviewed");
    assert_eq!(updated["progress"], 100);
    assert_eq!(updated["username"], "alice");

    let response = app
        .delete(&format!("/api/tasks/{}", task_id(&olaf_task)?), &org.manager_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/api/tasks/{}", task_id(&olaf_task)?), &org.admin_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Task deleted successfully");
    Ok(())
}

#[tokio::test]
async fn malformed_task_id_after_authentication() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app.client.delete(app.url("/api/tasks/abc")).send().await?;
    assert_eq!(
        error_of(response).await?,
        (
            StatusCode::UNAUTHORIZED,
            "Authorization header required".to_string()
        )
    );

    let (_, token) = app.signup("alice", "Eng").await?;
    let response = app
        .put("/api/tasks/abc", &token)
        .json(&json!({ "title": "t" }))
        .send()
        .await?;
    assert_eq!(
        error_of(response).await?,
        (StatusCode::BAD_REQUEST, "Invalid task ID".to_string())
    );
    Ok(())
}
