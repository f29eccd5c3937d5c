//! Core utilities for the vkframe execution core.
//!
//! This crate provides foundational types used by the GPU-facing crates:
//! - Error types and result aliases
//! - Logging initialization
//! - Engine configuration loaded from TOML
//! - Frame pacing statistics

mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, LoggingConfig, MAX_RECORDING_THREADS, RasterConfig, WindingOrder};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with};
pub use timer::{FrameStats, FrameTimer};
