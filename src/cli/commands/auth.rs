//! Session signing, password hashing and administrator bootstrap arguments.

use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_KEY_ID: &str = "jwt-key-id";
pub const ARG_JWT_PREVIOUS_SECRET: &str = "jwt-previous-secret";
pub const ARG_JWT_PREVIOUS_KEY_ID: &str = "jwt-previous-key-id";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";
pub const ARG_ADMIN_USERNAME: &str = "admin-username";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

pub struct Options {
    pub jwt_secret: SecretString,
    pub jwt_key_id: String,
    pub jwt_previous: Option<(String, SecretString)>,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminSeed>,
}

/// Administrator created at startup when the username is free.
pub struct AdminSeed {
    pub username: String,
    pub password: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is missing, or if only one half
    /// of the previous key pair is given.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(jwt_secret) = get_non_empty(ARG_JWT_SECRET) else {
            bail!("missing required argument: --{ARG_JWT_SECRET}");
        };

        let jwt_previous = match (
            get_non_empty(ARG_JWT_PREVIOUS_KEY_ID),
            get_non_empty(ARG_JWT_PREVIOUS_SECRET),
        ) {
            (Some(kid), Some(secret)) => Some((kid, SecretString::from(secret))),
            (None, None) => None,
            _ => bail!(
                "--{ARG_JWT_PREVIOUS_KEY_ID} and --{ARG_JWT_PREVIOUS_SECRET} must be set together"
            ),
        };

        let admin = match (
            get_non_empty(ARG_ADMIN_USERNAME),
            get_non_empty(ARG_ADMIN_PASSWORD),
        ) {
            (Some(username), Some(password)) => Some(AdminSeed {
                username,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            jwt_key_id: get_non_empty(ARG_JWT_KEY_ID).unwrap_or_else(|| "1".to_string()),
            jwt_previous,
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(14),
            admin,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign session tokens (HS256)")
                .env("TASKTRACK_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_KEY_ID)
                .long(ARG_JWT_KEY_ID)
                .help("Key id written to the `kid` header of issued tokens")
                .env("TASKTRACK_JWT_KEY_ID")
                .default_value("1"),
        )
        .arg(
            Arg::new(ARG_JWT_PREVIOUS_SECRET)
                .long(ARG_JWT_PREVIOUS_SECRET)
                .help("Retired signing secret still accepted for verification")
                .long_help(
                    "Retired signing secret still accepted for verification.\n\nSet together with --jwt-previous-key-id while rotating keys; drop both once every token signed with it has expired (24h).",
                )
                .env("TASKTRACK_JWT_PREVIOUS_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_PREVIOUS_KEY_ID)
                .long(ARG_JWT_PREVIOUS_KEY_ID)
                .help("Key id of the retired signing secret")
                .env("TASKTRACK_JWT_PREVIOUS_KEY_ID"),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt work factor for new password hashes")
                .env("TASKTRACK_BCRYPT_COST")
                .default_value("14")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
        .arg(
            Arg::new(ARG_ADMIN_USERNAME)
                .long(ARG_ADMIN_USERNAME)
                .help("Administrator created at startup if missing")
                .env("TASKTRACK_ADMIN_USERNAME")
                .default_value("admin"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password for the bootstrap administrator; no administrator is seeded without it")
                .env("TASKTRACK_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}
