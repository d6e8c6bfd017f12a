use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_BACKUP_DIR: &str = "backup-dir";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

pub struct Options {
    pub backup_dir: PathBuf,
    pub cors_origin: Option<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            backup_dir: matches
                .get_one::<String>(ARG_BACKUP_DIR)
                .map_or_else(|| PathBuf::from("data/backups"), PathBuf::from),
            cors_origin: matches
                .get_one::<String>(ARG_CORS_ORIGIN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKUP_DIR)
                .long(ARG_BACKUP_DIR)
                .help("Directory for the safety snapshot taken before every restore")
                .env("TASKTRACK_BACKUP_DIR")
                .default_value("data/backups"),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Allowed CORS origin (default: any)")
                .env("TASKTRACK_CORS_ORIGIN"),
        )
}
