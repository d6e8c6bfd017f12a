//! Spreadsheet exports of task lists.
//!
//! Each report selects rows with the same [`TaskScope`] SQL used by the task
//! listing and writes them to a single worksheet.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{
        HeaderMap,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    auth::{AuthState, Principal, principal::require_auth, role::Permission, scope::TaskScope},
    error::{ErrorBody, ServiceError},
    tasks::{storage, types::Task},
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const BASE_HEADERS: [&str; 6] = [
    "Title",
    "Description",
    "Progress (%)",
    "Hours per Week",
    "Load per Month (%)",
    "Created At",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    MyTasks,
    DepartmentTasks,
    AllTasks,
}

impl Report {
    const fn sheet_name(self) -> &'static str {
        match self {
            Self::MyTasks => "My Tasks",
            Self::DepartmentTasks => "Department Tasks",
            Self::AllTasks => "All Tasks",
        }
    }

    const fn file_name(self) -> &'static str {
        match self {
            Self::MyTasks => "my_tasks.xlsx",
            Self::DepartmentTasks => "department_tasks.xlsx",
            Self::AllTasks => "all_tasks.xlsx",
        }
    }

    const fn permission(self) -> Permission {
        match self {
            Self::MyTasks => Permission::ReportsOwn,
            Self::DepartmentTasks => Permission::ReportsDepartment,
            Self::AllTasks => Permission::ReportsAll,
        }
    }

    /// Rows are chosen by the report, not by the caller's listing scope:
    /// "my tasks" is always the caller's own, even for an admin.
    fn scope(self, principal: &Principal) -> TaskScope {
        match self {
            Self::MyTasks => TaskScope::Owner(principal.user_id),
            Self::DepartmentTasks => TaskScope::Department(principal.department.clone()),
            Self::AllTasks => TaskScope::All,
        }
    }

    const fn with_user(self) -> bool {
        matches!(self, Self::DepartmentTasks | Self::AllTasks)
    }

    const fn with_department(self) -> bool {
        matches!(self, Self::AllTasks)
    }

    fn headers(self) -> Vec<&'static str> {
        let mut headers = BASE_HEADERS.to_vec();
        if self.with_user() {
            headers.push("User");
        }
        if self.with_department() {
            headers.push("Department");
        }
        headers
    }
}

/// `YYYY-MM-DD` part of a stored timestamp.
fn created_date(created_at: &str) -> &str {
    created_at.get(..10).unwrap_or(created_at)
}

#[allow(clippy::cast_precision_loss)]
fn build_workbook(report: Report, tasks: &[Task]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(report.sheet_name())?;

    for (col, header) in (0u16..).zip(report.headers()) {
        worksheet.write_string_with_format(0, col, header, &bold)?;
    }

    for (row, task) in (1u32..).zip(tasks) {
        worksheet.write_string(row, 0, &task.title)?;
        worksheet.write_string(row, 1, &task.description)?;
        worksheet.write_number(row, 2, task.progress as f64)?;
        worksheet.write_number(row, 3, task.hours_per_week)?;
        worksheet.write_number(row, 4, task.load_per_month as f64)?;
        worksheet.write_string(row, 5, created_date(&task.created_at))?;
        if report.with_user() {
            worksheet.write_string(row, 6, task.username.as_deref().unwrap_or_default())?;
        }
        if report.with_department() {
            worksheet.write_string(row, 7, task.department.as_deref().unwrap_or_default())?;
        }
    }

    workbook.save_to_buffer()
}

#[instrument(skip(headers, pool, auth))]
async fn export(
    report: Report,
    headers: &HeaderMap,
    pool: &SqlitePool,
    auth: &AuthState,
) -> Result<Response, ServiceError> {
    let principal = require_auth(headers, auth)?;
    principal.ensure(report.permission())?;

    let tasks = storage::list_tasks(pool, &report.scope(&principal)).await?;
    let bytes = build_workbook(report, &tasks).context("failed to build spreadsheet")?;
    debug!("Exported {} rows to {}", tasks.len(), report.file_name());

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename={}", report.file_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/reports/my-tasks",
    responses(
        (status = 200, description = "Spreadsheet of the caller's own tasks.", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn my_tasks(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Response, ServiceError> {
    export(Report::MyTasks, &headers, &pool, &auth).await
}

#[utoipa::path(
    get,
    path = "/api/reports/department-tasks",
    responses(
        (status = 200, description = "Spreadsheet of the caller's department (manager or admin).", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Manager or admin access required.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn department_tasks(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Response, ServiceError> {
    export(Report::DepartmentTasks, &headers, &pool, &auth).await
}

#[utoipa::path(
    get,
    path = "/api/reports/all-tasks",
    responses(
        (status = 200, description = "Spreadsheet of every task (admin-only).", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 401, description = "Missing, invalid or expired token.", body = ErrorBody),
        (status = 403, description = "Admin access required.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn all_tasks(
    headers: HeaderMap,
    pool: Extension<SqlitePool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Response, ServiceError> {
    export(Report::AllTasks, &headers, &pool, &auth).await
}
