//! Row visibility and mutation scope for tasks.
//!
//! The scope is derived from the caller's role alone and rendered into the SQL
//! statement that reads or modifies tasks. Queries using it must join
//! `tasks t` with `users u ON u.id = t.user_id`.

use sqlx::{QueryBuilder, Sqlite};

use super::role::Role;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task.
    All,
    /// Tasks whose owner belongs to this department.
    Department(String),
    /// Tasks owned by this identity.
    Owner(i64),
}

/// Owner facts needed to decide whether a task may be mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskOwner {
    pub user_id: i64,
    pub department: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationDecision {
    Allowed,
    Denied,
    NotFound,
}

impl TaskScope {
    #[must_use]
    pub fn for_role(role: Role, user_id: i64, department: &str) -> Self {
        match role {
            Role::Admin => Self::All,
            Role::Manager => Self::Department(department.to_string()),
            Role::User => Self::Owner(user_id),
        }
    }

    /// Append ` WHERE ...` for this scope (nothing for [`TaskScope::All`]).
    pub fn push_filter(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::All => {}
            Self::Department(department) => {
                builder
                    .push(" WHERE u.department = ")
                    .push_bind(department.clone());
            }
            Self::Owner(user_id) => {
                builder.push(" WHERE t.user_id = ").push_bind(*user_id);
            }
        }
    }

    /// Decide whether a task owned by `owner` may be updated or deleted.
    ///
    /// Owner-scoped callers get `Denied` for missing tasks too; only callers
    /// with a wider scope learn that a task does not exist.
    #[must_use]
    pub fn decide_mutation(&self, owner: Option<&TaskOwner>) -> MutationDecision {
        match (self, owner) {
            (Self::Owner(_), None) => MutationDecision::Denied,
            (_, None) => MutationDecision::NotFound,
            (Self::All, Some(_)) => MutationDecision::Allowed,
            (Self::Department(department), Some(owner)) => {
                if owner.department.as_deref() == Some(department.as_str()) {
                    MutationDecision::Allowed
                } else {
                    MutationDecision::Denied
                }
            }
            (Self::Owner(user_id), Some(owner)) => {
                if owner.user_id == *user_id {
                    MutationDecision::Allowed
                } else {
                    MutationDecision::Denied
                }
            }
        }
    }
}
