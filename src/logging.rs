//! Logging System
//!
//! Structured logging via the `tracing` crate. The engine is embedded in a
//! host process that owns log destinations, so initialization covers level,
//! format, and color only; `CAUSEWAY_LOG` overrides the configured level.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    pub level: String,

    /// Output format: json, text
    pub format: String,

    /// Enable colored output (text format only)
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            color: true,
        }
    }
}

/// Initialize the logging system.
///
/// Fails if a global subscriber is already installed, so hosts embedding the
/// engine alongside their own logging should skip this.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SyncError> {
    let filter = build_env_filter(config)?;
    let base_subscriber = Registry::default().with(filter);

    if config.format == "json" {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()
            .map_err(|e| SyncError::ConfigError(format!("Failed to initialize logging: {}", e)))?;
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color),
            )
            .try_init()
            .map_err(|e| SyncError::ConfigError(format!("Failed to initialize logging: {}", e)))?;
    }

    Ok(())
}

/// Build the environment filter from `CAUSEWAY_LOG` or the config level.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, SyncError> {
    if let Ok(filter) = EnvFilter::try_from_env("CAUSEWAY_LOG") {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level)
        .map_err(|e| SyncError::ConfigError(format!("Invalid log level {:?}: {}", config.level, e)))
}
