//! Synchronization primitives.
//!
//! This module provides owning wrappers for Vulkan synchronization objects,
//! created through a [`GpuBackend`]:
//! - [`Semaphore`] - GPU-to-GPU ordering (acquire -> render -> present)
//! - [`Fence`] - GPU-to-CPU completion signal
//! - [`FrameSync`] - the set owned by one frame slot
//!
//! Each wrapper destroys its handle on drop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::backend::GpuBackend;
//! use vkframe_rhi::sync::FrameSync;
//!
//! # fn example(backend: Arc<dyn GpuBackend>) -> Result<(), vkframe_rhi::RhiError> {
//! let frames: Vec<FrameSync> = (0..2)
//!     .map(|_| FrameSync::new(backend.clone()))
//!     .collect::<Result<_, _>>()?;
//!
//! // Start of a frame: wait for the slot's previous submission.
//! let frame = &frames[0];
//! frame.in_flight_fence().wait(u64::MAX)?;
//! frame.in_flight_fence().reset()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::error::RhiResult;

/// Owned semaphore.
///
/// Semaphores are used for GPU-to-GPU synchronization between queue
/// operations:
/// - image available: signaled when a swapchain image is ready
/// - render finished: signaled when the frame's commands have executed
pub struct Semaphore {
    backend: Arc<dyn GpuBackend>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(backend: Arc<dyn GpuBackend>) -> RhiResult<Self> {
        let semaphore = backend.create_semaphore()?;
        Ok(Self { backend, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.backend.destroy_semaphore(self.semaphore);
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Semaphore").field(&self.semaphore).finish()
    }
}

/// Owned fence.
///
/// Fences let the host wait for GPU work. The frame core uses one per frame
/// slot to know when that slot's command buffers may be reset.
pub struct Fence {
    backend: Arc<dyn GpuBackend>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `backend` - The device seam
    /// * `signaled` - Create the fence already signaled, so the first wait on
    ///   it returns immediately
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(backend: Arc<dyn GpuBackend>, signaled: bool) -> RhiResult<Self> {
        let fence = backend.create_fence(signaled)?;
        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );
        Ok(Self { backend, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns `RhiError::Vulkan(vk::Result::TIMEOUT)` if the timeout
    /// expires, or the driver error if the wait fails.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        self.backend.wait_for_fence(self.fence, timeout)
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        self.backend.reset_fence(self.fence)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.backend.destroy_fence(self.fence);
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fence").field(&self.fence).finish()
    }
}

/// Synchronization objects owned by one frame slot.
///
/// # Usage Pattern
///
/// ```text
/// 1. Wait for in_flight_fence (CPU waits for the slot's previous submission)
/// 2. Acquire swapchain image (signals image_available)
/// 3. Reset in_flight_fence
/// 4. Submit:
///    - wait on image_available at COLOR_ATTACHMENT_OUTPUT
///    - signal render_finished
///    - signal in_flight_fence
/// 5. Present (waits on render_finished)
/// ```
#[derive(Debug)]
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates the slot's semaphores and a signaled in-flight fence.
    ///
    /// # Errors
    ///
    /// Returns an error if any synchronization object creation fails.
    pub fn new(backend: Arc<dyn GpuBackend>) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(backend.clone())?,
            render_finished: Semaphore::new(backend.clone())?,
            in_flight_fence: Fence::new(backend, true)?,
        })
    }

    /// Semaphore signaled when the acquired swapchain image is ready.
    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    /// Semaphore signaled when the frame's commands finish executing.
    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    /// Fence signaled when the slot's last synchronized submission retires.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }

    #[test]
    fn test_frame_sync_fence_starts_signaled() {
        let mock = Arc::new(MockBackend::new());
        let frame = FrameSync::new(mock.clone()).unwrap();

        frame.in_flight_fence().wait(0).unwrap();
        assert_eq!(mock.fence_wait_count(frame.in_flight_fence().handle()), 1);
        assert_ne!(
            frame.image_available().handle(),
            frame.render_finished().handle()
        );
    }

    #[test]
    fn test_reset_fence_blocks_until_signaled() {
        let mock = Arc::new(MockBackend::new());
        let fence = Fence::new(mock.clone(), true).unwrap();

        fence.reset().unwrap();
        assert!(fence.wait(1_000).is_err());
    }

    #[test]
    fn test_drop_destroys_handles() {
        let mock = Arc::new(MockBackend::new());
        {
            let _frame = FrameSync::new(mock.clone()).unwrap();
            assert_eq!(mock.stats().live_sync_objects, 3);
        }
        assert_eq!(mock.stats().live_sync_objects, 0);
    }
}
