//! Tracing subscriber setup for binaries embedding the service
//!
//! The library itself never installs a global subscriber; events flow
//! through the injected [`EventSink`](crate::events::EventSink).

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to the
/// configured level.
///
/// # Errors
///
/// Returns [`Error::Config`] if the level is not a valid filter directive
/// or a global subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .map_err(|e| Error::Config(format!("invalid log level {:?}: {e}", logging.level)))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Config(format!("tracing already initialized: {e}")))
}
