//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides the device-facing half of the frame core using the
//! `ash` crate. It handles:
//! - The [`backend::GpuBackend`] seam and its Vulkan implementation
//! - Per-frame command buffer pooling
//! - Fences, semaphores and per-frame sync bundles
//! - Pipeline, render pass and framebuffer descriptions
//! - Shader modules, vertex layouts and descriptor bindings
//! - Swapchain snapshots

mod error;

pub mod backend;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod pipeline;
pub mod rendering;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
