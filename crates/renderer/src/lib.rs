//! Per-frame GPU execution core.
//!
//! This crate turns pipeline state and draw calls into synchronized,
//! multi-buffered submissions:
//! - Pipeline/state caching keyed by logical state
//! - Frame orchestration over N frames in flight
//! - Per-thread command buffer recording
//! - Named render-target resolution
//! - Per-frame object buffers

mod error;

pub mod cache;
pub mod frame;
pub mod hash;
pub mod objects;
pub mod orchestrator;
pub mod recording;
pub mod registry;
pub mod state;

pub use cache::{CacheStats, CachedPipeline, PipelineStateCache, RenderState};
pub use error::{EngineError, EngineResult};
pub use frame::FramePhase;
pub use objects::{ObjectId, ObjectRing};
pub use orchestrator::FrameOrchestrator;
pub use recording::{RecordingSlots, bind_recording_thread, recording_thread};
pub use registry::{Lifetime, ResourceId, ResourceRegistry};
pub use state::{MAX_RENDER_TARGETS, PipelineState, ShaderSet, ShaderStages};
