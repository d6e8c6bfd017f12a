//! Command-line argument dispatch.
//!
//! Turns validated CLI matches into an [`Action`] carrying the full server
//! configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, storage};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let storage_opts = storage::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        jwt_key_id: auth_opts.jwt_key_id,
        jwt_previous: auth_opts.jwt_previous,
        bcrypt_cost: auth_opts.bcrypt_cost,
        admin: auth_opts.admin,
        backup_dir: storage_opts.backup_dir,
        cors_origin: storage_opts.cors_origin,
    }))
}
