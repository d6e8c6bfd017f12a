//! Error type shared by every handler.
//!
//! Client errors carry a short message in a `{"error": ...}` body. Storage and
//! internal failures are logged here and answered with a generic 500 so driver
//! details never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use super::auth::token::TokenError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    AccessDenied(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{message}")]
    Conflict {
        message: &'static str,
        task_count: Option<i64>,
    },
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Token(TokenError::MissingToken | TokenError::InvalidSignature | TokenError::Expired)
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Token(TokenError::MissingSecret | TokenError::Signing(_))
            | Self::Persistence(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<i64>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Token(TokenError::MissingToken) => ErrorBody {
                error: "Authorization header required".to_string(),
                task_count: None,
            },
            Self::Token(TokenError::InvalidSignature) => ErrorBody {
                error: "Invalid token".to_string(),
                task_count: None,
            },
            Self::Token(TokenError::Expired) => ErrorBody {
                error: "Token expired".to_string(),
                task_count: None,
            },
            Self::Conflict {
                message,
                task_count,
            } => ErrorBody {
                error: message.to_string(),
                task_count,
            },
            err if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Failed to handle request: {err}");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    task_count: None,
                }
            }
            err => ErrorBody {
                error: err.to_string(),
                task_count: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServiceError::validation("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Token(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Token(TokenError::MissingSecret).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::AccessDenied("Access denied").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::NotFound("Task not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Persistence(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflict_keeps_task_count() {
        let response = ServiceError::Conflict {
            message: "User still owns tasks",
            task_count: Some(3),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
