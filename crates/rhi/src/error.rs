//! RHI-specific error types.

use thiserror::Error;

use crate::shader::ShaderKey;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// A frame slot's fence did not signal within the configured timeout.
    ///
    /// This is the diagnostic path for a hung GPU: the frame loop stops
    /// instead of blocking forever.
    #[error("Fence for frame slot {slot} did not signal within {timeout_ms} ms (GPU hang?)")]
    FenceTimeout { slot: usize, timeout_ms: u64 },

    /// The swapchain no longer matches the surface and must be recreated
    #[error("Swapchain is out of date")]
    SwapchainOutOfDate,

    /// A frame slot was made current again before its fence was waited on
    #[error("Frame slot {slot} is still in flight; wait on its fence before reuse")]
    SlotInFlight { slot: usize },

    /// A command buffer was requested while no frame slot is current
    #[error("No current frame slot; call set_current_frame first")]
    NoCurrentFrame,

    /// Recording was attempted through a closed or invalidated handle
    #[error("Command buffer is not open for recording")]
    CommandBufferClosed,

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A shader key was registered twice
    #[error("Shader {0} is already registered")]
    DuplicateShader(ShaderKey),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
