//! Request/response types for task endpoints and their validation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::handlers::error::ServiceError;

pub const MAX_TITLE_LEN: usize = 255;

/// A task joined with its owner's username and department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub progress: i64,
    pub hours_per_week: f64,
    pub load_per_month: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub department: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of create and update requests. Omitted numbers default to zero.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub hours_per_week: Option<f64>,
    #[serde(default)]
    pub load_per_month: Option<i64>,
}

/// Validated, storable task fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub progress: i64,
    pub hours_per_week: f64,
    pub load_per_month: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl TryFrom<TaskRequest> for TaskFields {
    type Error = ServiceError;

    fn try_from(request: TaskRequest) -> Result<Self, Self::Error> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::validation("Title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ServiceError::validation(format!(
                "Title must be at most {MAX_TITLE_LEN} characters"
            )));
        }

        let progress = request.progress.unwrap_or(0);
        if !(0..=100).contains(&progress) {
            return Err(ServiceError::validation("Progress must be between 0 and 100"));
        }

        let hours_per_week = request.hours_per_week.unwrap_or(0.0);
        if !hours_per_week.is_finite() || hours_per_week < 0.0 {
            return Err(ServiceError::validation(
                "Hours per week must be a non-negative number",
            ));
        }

        let load_per_month = request.load_per_month.unwrap_or(0);
        if !(0..=100).contains(&load_per_month) {
            return Err(ServiceError::validation(
                "Load per month must be between 0 and 100",
            ));
        }

        Ok(Self {
            title,
            description: request.description.unwrap_or_default(),
            progress,
            hours_per_week,
            load_per_month,
        })
    }
}
