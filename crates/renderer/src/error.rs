//! Renderer error types.

use thiserror::Error;

use vkframe_rhi::RhiError;

use crate::frame::FramePhase;
use crate::objects::ObjectId;
use crate::registry::ResourceId;

/// Error type for the state cache and the frame orchestrator.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Device or command pool failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Configuration or logging failure
    #[error(transparent)]
    Core(#[from] vkframe_core::Error),

    /// The calling thread already has an open command buffer
    #[error("Recording thread {thread} already has an open command buffer")]
    CommandBufferAlreadyOpen { thread: usize },

    /// The calling thread has no open command buffer
    #[error("Recording thread {thread} has no open command buffer")]
    NoOpenCommandBuffer { thread: usize },

    /// A submit was attempted while a command buffer is still recording
    #[error("Cannot submit while a command buffer is still recording")]
    RecordingInProgress,

    /// The bound shaders do not form a complete graphics or compute set
    #[error("Incomplete shader set: {0}")]
    IncompleteShaderSet(&'static str),

    /// Render target index out of range
    #[error("Render target index {0} is out of range")]
    RenderTargetIndex(usize),

    /// A render target slot was used without an image view bound to it
    #[error("Render target {0} is not set")]
    UnsetRenderTarget(usize),

    /// A render target is bound after an unset slot
    #[error("Render target {0} is bound after an unset slot")]
    RenderTargetGap(usize),

    /// A render state was requested with no render targets bound
    #[error("No render targets are bound")]
    NoRenderTargets,

    /// Uniform slot index out of range
    #[error("Uniform slot {0} is out of range")]
    UniformSlot(usize),

    /// A descriptor set is bound above an unset lower set
    #[error("Descriptor set {0} is not bound")]
    DescriptorSetGap(u32),

    /// The resource registry has no entry for the id
    #[error("Unknown resource {0}")]
    UnknownResource(ResourceId),

    /// An operation was called in the wrong frame phase
    #[error("{operation} is not valid while the frame is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: FramePhase,
    },

    /// A thread index outside the configured recording slots
    #[error("Recording thread index {0} is out of range")]
    RecordingThread(usize),

    /// An object's size does not match the ring's object stride
    #[error("Object is {actual} byte(s) but the ring stores {expected}-byte objects")]
    ObjectStride { expected: usize, actual: usize },

    /// A per-slot buffer cannot hold the ring's full object capacity
    #[error("Object buffer {slot} holds {capacity} byte(s), {required} required")]
    ObjectBufferTooSmall {
        slot: usize,
        capacity: usize,
        required: usize,
    },

    /// The object ring is at capacity
    #[error("Object ring is full ({0} objects)")]
    ObjectRingFull(usize),

    /// The object ring has no object with this id
    #[error("Unknown object {0}")]
    UnknownObject(ObjectId),

    /// The object ring does not have one buffer per frame slot
    #[error("Object ring has {buffers} buffer(s) for {frames} frame slot(s)")]
    ObjectRingSlots { buffers: usize, frames: usize },

    /// No object ring is attached to the orchestrator
    #[error("No object ring attached")]
    NoObjectRing,
}

/// Result type alias for renderer operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
