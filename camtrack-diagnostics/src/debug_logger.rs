//! Structured debug logging setup

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor a configured filter is given
pub const DEFAULT_LOG_FILTER: &str = "camtrack=info,camtrack_core=info,camtrack_media=info";

/// Logging setup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoggingError {
    /// Filter directives could not be parsed
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Offending filter
        filter: String,
        /// Parser message
        reason: String,
    },
}

fn build_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    let directives = if filter.trim().is_empty() {
        DEFAULT_LOG_FILTER
    } else {
        filter
    };
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins over `filter`. Returns `Ok(false)` when a global
/// subscriber was already installed, so repeated calls are harmless.
pub fn init_logging(filter: &str) -> Result<bool, LoggingError> {
    let env_filter = build_filter(filter)?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized");
    }
    Ok(installed)
}
