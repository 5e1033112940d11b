//! Logging setup for hosting processes.

use crate::config::OwtConfig;
use crate::errors::OwtError;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "owt=info,summat=info";

/// Builds the log filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(json: bool) -> Result<(), OwtError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| OwtError::Config(format!("failed to install logger: {e}")))
}

/// Installs the subscriber described by `config`.
pub fn init_from_config(config: &OwtConfig) -> Result<(), OwtError> {
    init_logging(config.json_logs)
}
