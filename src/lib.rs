//! # tasktrack (Task tracking with role-scoped access)
//!
//! `tasktrack` is a REST backend where users keep track of their tasks and
//! managers and administrators see wider slices of the same data.
//!
//! ## Sessions
//!
//! Register and login return an HS256 JWT valid for 24 hours. Its claims
//! (user id, username, role, department) are trusted until expiry: a role or
//! department change takes effect at the next login. There is no server-side
//! revocation list.
//!
//! ## Roles and Scope
//!
//! - **user:** sees and edits only their own tasks.
//! - **manager:** sees and edits tasks of everyone in their department, and can
//!   export the department report.
//! - **admin:** sees everything, manages users, exports every report, and can
//!   back up and restore the database.
//!
//! Scope is applied in SQL, never by filtering rows in memory. A `user` asking
//! to change a task that is not theirs, or that does not exist, gets `403`;
//! managers and admins get `404` for missing tasks.
//!
//! ## Storage
//!
//! SQLite through `sqlx`. The schema in `sql/schema.sql` is applied on every
//! start; backups are consistent `VACUUM INTO` snapshots.

pub mod api;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
