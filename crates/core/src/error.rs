//! Error types shared by the vkframe crates.

use thiserror::Error;

/// Error type for configuration, logging and other host-side concerns.
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value is out of range or inconsistent
    #[error("Config error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML for [`crate::EngineConfig`]
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
