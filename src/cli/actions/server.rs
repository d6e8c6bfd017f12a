use crate::{
    api::{self, AppContext, AuthConfig, AuthState, BackupConfig},
    cli::{commands::auth::AdminSeed, telemetry},
    db,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, path::PathBuf, sync::Arc};
use tracing::{debug, warn};

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub jwt_key_id: String,
    pub jwt_previous: Option<(String, SecretString)>,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminSeed>,
    pub backup_dir: PathBuf,
    pub cors_origin: Option<String>,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("jwt_secret", &"***")
            .field("jwt_key_id", &self.jwt_key_id)
            .field(
                "jwt_previous_key_id",
                &self.jwt_previous.as_ref().map(|(kid, _)| kid.as_str()),
            )
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field(
                "admin_username",
                &self.admin.as_ref().map(|seed| seed.username.as_str()),
            )
            .field("backup_dir", &self.backup_dir)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the auth state cannot be built, the database cannot be
/// opened or seeded, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let mut auth_config = AuthConfig::new(args.jwt_secret)
        .with_jwt_key_id(args.jwt_key_id)
        .with_bcrypt_cost(args.bcrypt_cost);
    if let Some((kid, secret)) = args.jwt_previous {
        auth_config = auth_config.with_jwt_previous(kid, secret);
    }
    let auth = Arc::new(AuthState::from_config(&auth_config)?);

    let pool = db::connect(&args.dsn)
        .await
        .with_context(|| format!("Failed to open database {}", args.dsn))?;

    match &args.admin {
        Some(seed) => {
            db::seed_admin(
                &pool,
                auth.hasher(),
                &seed.username,
                seed.password.expose_secret(),
            )
            .await
            .context("Failed to seed administrator")?;
        }
        None => warn!("No administrator password configured; skipping administrator seeding"),
    }

    let context = AppContext {
        pool,
        auth,
        backup: BackupConfig::new(args.backup_dir),
        cors_origin: args.cors_origin,
    };

    let result = api::new(args.port, context).await;
    telemetry::shutdown_tracer();
    result
}
