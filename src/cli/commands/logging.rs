//! `--verbose` / `TASKTRACK_LOG_LEVEL` and the log directives derived from it.

use clap::{Arg, ArgAction, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted by `TASKTRACK_LOG_LEVEL`, indexed by verbosity count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Dependency targets held at a fixed level so `-vvv` shows tasktrack's own
/// request and query spans without driver chatter.
pub const DEPENDENCY_DIRECTIVES: [&str; 5] = [
    "hyper=error",
    "tokio=error",
    "sqlx=warn",
    "tower_http=info",
    "opentelemetry_sdk=warn",
];

fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_lowercase();
    if let Ok(count) = value.parse::<u8>() {
        return Ok(count);
    }
    LEVEL_NAMES
        .iter()
        .position(|name| *name == value)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level, expected one of {}", LEVEL_NAMES.join(", ")))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

/// Verbosity count to tracing level; `None` keeps the ERROR default.
#[must_use]
pub const fn level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log level: repeat -v, or set TASKTRACK_LOG_LEVEL to error|warn|info|debug|trace")
            .env("TASKTRACK_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_counts_parse() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level(" INFO "), Ok(2));
        assert_eq!(parse_level("trace"), Ok(4));
        assert_eq!(parse_level("3"), Ok(3));
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn counts_map_to_levels() {
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Level::WARN));
        assert_eq!(level(2), Some(Level::INFO));
        assert_eq!(level(3), Some(Level::DEBUG));
        assert_eq!(level(9), Some(Level::TRACE));
    }

    #[test]
    fn dependency_directives_parse() {
        for directive in DEPENDENCY_DIRECTIVES {
            assert!(
                directive
                    .parse::<tracing_subscriber::filter::Directive>()
                    .is_ok(),
                "{directive}"
            );
        }
    }
}
