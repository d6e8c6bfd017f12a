//! Authentication, session tokens and role-based authorization.
//!
//! Passwords are stored as bcrypt hashes. A successful register or login
//! returns an HS256 session token whose claims (id, username, role and
//! department) are trusted for 24 hours. Every protected handler resolves the
//! caller with [`principal::require_auth`] and derives its row visibility from
//! the role via [`scope::TaskScope`].

pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod role;
pub(crate) mod scope;
mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;

pub use password::PasswordHasher;
pub use principal::Principal;
pub use state::{AuthConfig, AuthState};
