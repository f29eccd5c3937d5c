//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! frames_in_flight = 2
//! recording_threads = 4
//! fence_timeout_ms = 5000
//!
//! [raster]
//! front_face = "clockwise"
//! cull_back_faces = true
//!
//! [logging]
//! filter = "info,vkframe=debug"
//! thread_ids = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upper bound on worker threads that may record command buffers concurrently.
pub const MAX_RECORDING_THREADS: usize = 8;

/// Upper bound on frames in flight.
const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Top-level configuration for the frame execution core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of frame slots the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Number of per-thread recording slots.
    pub recording_threads: usize,
    /// Fence and image-acquire timeout in milliseconds. Zero waits forever.
    pub fence_timeout_ms: u64,
    /// Fixed-function rasterizer settings baked into every graphics pipeline.
    pub raster: RasterConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Triangle winding treated as front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindingOrder {
    #[default]
    Clockwise,
    CounterClockwise,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub front_face: WindingOrder,
    pub cull_back_faces: bool,
}

/// Logging configuration consumed by [`crate::init_logging_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Annotate log lines with the emitting thread id.
    pub thread_ids: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            recording_threads: 4,
            fence_timeout_ms: 5_000,
            raster: RasterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            front_face: WindingOrder::Clockwise,
            cull_back_faces: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: crate::logging::DEFAULT_FILTER.to_string(),
            thread_ids: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`EngineConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file if it exists and is valid, otherwise
    /// return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("Ignoring config {}: {e}", path.display());
            Self::default()
        })
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `frames_in_flight` or `recording_threads`
    /// is zero or above its maximum.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        if !(1..=MAX_RECORDING_THREADS).contains(&self.recording_threads) {
            return Err(Error::Config(format!(
                "recording_threads must be in 1..={MAX_RECORDING_THREADS}, got {}",
                self.recording_threads
            )));
        }
        Ok(())
    }

    /// Fence timeout in nanoseconds as expected by Vulkan wait calls.
    ///
    /// A zero `fence_timeout_ms` maps to `u64::MAX` (no timeout).
    pub fn fence_timeout_ns(&self) -> u64 {
        if self.fence_timeout_ms == 0 {
            u64::MAX
        } else {
            self.fence_timeout_ms.saturating_mul(1_000_000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.raster.cull_back_faces);
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            frames_in_flight = 3

            [raster]
            front_face = "counter_clockwise"
            "#,
        )
        .unwrap();

        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.recording_threads, 4);
        assert_eq!(config.raster.front_face, WindingOrder::CounterClockwise);
        assert!(config.raster.cull_back_faces);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("frames_in_flight = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("recording_threads = 64"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("frames_in_flight = \"two\""),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_fence_timeout_conversion() {
        let mut config = EngineConfig::default();
        assert_eq!(config.fence_timeout_ns(), 5_000_000_000);

        config.fence_timeout_ms = 0;
        assert_eq!(config.fence_timeout_ns(), u64::MAX);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = EngineConfig::load_or_default("/nonexistent/vkframe.toml");
        assert_eq!(config, EngineConfig::default());
    }
}
