//! Service configuration
//!
//! Built-in defaults, optionally overridden from a TOML file:
//!
//! ```toml
//! store_timeout_ms = 5000
//! averaging = "accumulate"   # or "mean"
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::experiment::AveragingMode;
use crate::{Error, Result};

/// Upper bound on a single store call when nothing else is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregation service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Upper bound on each store call
    pub store_timeout: Duration,
    /// How channel samples are combined
    pub averaging: AveragingMode,
    /// Logging setup for binaries embedding the service
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            averaging: AveragingMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Set the per-call store timeout.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the averaging mode.
    #[must_use]
    pub const fn with_averaging(mut self, averaging: AveragingMode) -> Self {
        self.averaging = averaging;
        self
    }

    /// Parse configuration from TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid TOML, has unknown
    /// values, or sets a zero store timeout.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        file.into_config()
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or fails [`Self::from_toml_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    store_timeout_ms: Option<u64>,
    #[serde(default)]
    averaging: Option<AveragingMode>,
    #[serde(default)]
    logging: LoggingConfig,
}

impl ConfigFile {
    fn into_config(self) -> Result<ServiceConfig> {
        let store_timeout = match self.store_timeout_ms {
            Some(0) => {
                return Err(Error::Config(
                    "store_timeout_ms must be greater than zero".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_STORE_TIMEOUT,
        };

        Ok(ServiceConfig {
            store_timeout,
            averaging: self.averaging.unwrap_or_default(),
            logging: self.logging,
        })
    }
}
