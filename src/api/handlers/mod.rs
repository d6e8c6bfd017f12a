//! API handlers and shared utilities for tasktrack.
//!
//! This module organizes the route handlers and provides the input checks they
//! share: username/department rules and JSON body extraction that reports
//! malformed payloads as 400 with the usual `{"error": ...}` body.

pub mod auth;
pub mod backup;
pub mod error;
pub mod health;
pub mod me;
pub mod reports;
pub mod root;
pub mod tasks;
pub mod user_login;
pub mod user_register;
pub mod users;

use axum::{
    Json,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
};
use once_cell::sync::Lazy;
use regex::Regex;

use self::error::ServiceError;

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_DEPARTMENT_LEN: usize = 100;

static USERNAME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(&format!(
        r"^[\p{{L}}\p{{N}}._-]{{1,{MAX_USERNAME_LEN}}}$"
    ))
    .ok()
});

/// Usernames are 1 to [`MAX_USERNAME_LEN`] letters, digits, `.`, `_` or `-`.
pub fn valid_username(username: &str) -> bool {
    USERNAME_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(username))
}

/// Trim a department name and enforce its bounds.
///
/// # Errors
/// Returns a validation error for blank or overlong names.
pub fn normalize_department(department: &str) -> Result<String, ServiceError> {
    let department = department.trim();
    if department.is_empty() {
        return Err(ServiceError::validation("Department is required"));
    }
    if department.chars().count() > MAX_DEPARTMENT_LEN {
        return Err(ServiceError::validation(format!(
            "Department must be at most {MAX_DEPARTMENT_LEN} characters"
        )));
    }
    Ok(department.to_string())
}

/// Unwrap a JSON body, turning axum's rejection into a 400.
///
/// # Errors
/// Returns [`ServiceError::Validation`] with the rejection text.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) => Err(ServiceError::Validation(rejection.body_text())),
    }
}

/// Unwrap a numeric path id. Callers authenticate first so a bad id never
/// masks a 401 or 403.
///
/// # Errors
/// Returns [`ServiceError::Validation`] with `message` when the segment is not
/// an integer.
pub fn path_id(
    path: Result<Path<i64>, PathRejection>,
    message: &'static str,
) -> Result<i64, ServiceError> {
    path.map(|Path(id)| id)
        .map_err(|_| ServiceError::validation(message))
}
