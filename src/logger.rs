//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the configured level is known.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; `level` is the fallback. `level`
/// accepts plain level strings (`"info"`) as well as full filter directives
/// (`"tapestry=debug,tower=warn"`).
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Check a configured level before it reaches [`init`]. Accepts a plain
/// level or a comma-separated list of `target=level` directives.
pub fn validate_level(level: &str) -> Result<(), AppError> {
    if level.trim().is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    for directive in level.split(',') {
        let lvl = directive.rsplit_once('=').map_or(directive, |(_, l)| l);
        lvl.trim()
            .parse::<LevelFilter>()
            .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))?;
    }
    Ok(())
}
