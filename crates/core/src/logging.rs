//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,vkframe=debug";

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Target and thread id annotations, useful when recording fans out
///   to worker threads
///
/// Panics if a global subscriber is already installed; use
/// [`init_logging_with`] when that can happen.
///
/// # Example
/// ```no_run
/// vkframe_core::init_logging();
/// tracing::info!("Frame core initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize logging from a [`LoggingConfig`].
///
/// `RUST_LOG` still wins over the configured filter so a single run can be
/// made more verbose without touching the config file.
///
/// # Errors
///
/// Returns [`Error::Logging`] if the filter does not parse or a global
/// subscriber has already been set.
pub fn init_logging_with(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| Error::Logging(format!("invalid filter '{}': {e}", config.filter)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(config.thread_ids),
        )
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
