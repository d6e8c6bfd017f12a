use crate::APP_USER_AGENT;
use axum::response::IntoResponse;

/// Plain-text banner for `GET /`.
pub async fn root() -> impl IntoResponse {
    format!("{APP_USER_AGENT}\n")
}
