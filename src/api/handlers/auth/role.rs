//! Roles and the permission table derived from them.
//!
//! Roles are stored and transported as lowercase strings. Parsing stored or
//! claimed values never fails: anything unrecognized is treated as `user`, the
//! least privileged role. Requests that *assign* a role go through
//! [`Role::parse_strict`] instead, so typos are rejected rather than silently
//! downgraded.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    User,
    Manager,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Parse a role supplied by an administrator. Unknown values are an error.
    #[must_use]
    pub fn parse_strict(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Parse a role read back from storage or a token.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match Self::parse_strict(value) {
            Some(role) => role,
            // Least privilege for anything we do not recognize.
            None => Self::User,
        }
    }

    #[must_use]
    pub const fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::TasksRead | Permission::TasksWrite | Permission::ReportsOwn => true,
            Permission::ReportsDepartment => matches!(self, Self::Manager | Self::Admin),
            Permission::UsersRead
            | Permission::UsersAssignRole
            | Permission::UsersAssignDepartment
            | Permission::UsersDelete
            | Permission::ReportsAll
            | Permission::Backup => matches!(self, Self::Admin),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::from_stored(&value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations gated by role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    TasksRead,
    TasksWrite,
    ReportsOwn,
    ReportsDepartment,
    ReportsAll,
    UsersRead,
    UsersAssignRole,
    UsersAssignDepartment,
    UsersDelete,
    Backup,
}
