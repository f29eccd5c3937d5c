//! Per-frame command buffer pooling.
//!
//! Command buffers are allocated once and recycled: each frame slot owns a
//! [`CommandBufferAllocator`] whose buffers are reset (never freed) when the
//! slot comes around again, so the steady-state frame loop performs no
//! allocations.
//!
//! # Overview
//!
//! - [`CommandPool`] owns one `VkCommandPool` per queue kind (graphics,
//!   compute) and the per-slot allocators
//! - [`CommandBufferAllocator`] is the growable buffer list of one slot,
//!   with a watermark of how many buffers the current frame has handed out
//! - [`CommandBufferHandle`] is the non-owning token given to recorders
//!
//! # Slot reuse
//!
//! A slot's buffers may only be reset after the GPU has finished executing
//! them. The pool tracks this: submitting from a slot marks it in flight,
//! [`CommandPool::retire_frame`] clears the mark once the caller has waited
//! on the slot's fence, and [`CommandPool::set_current_frame`] refuses to
//! reset a slot that is still in flight.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::backend::{GpuBackend, QueueKind, SubmitBatch};
//! use vkframe_rhi::command::CommandPool;
//! use vkframe_rhi::vk;
//!
//! # fn example(backend: Arc<dyn GpuBackend>) -> Result<(), vkframe_rhi::RhiError> {
//! let mut pool = CommandPool::new(backend.clone())?;
//!
//! pool.set_current_frame(0)?;
//! let mut cmd = pool.graphics_command_buffer()?;
//! cmd.begin(backend.as_ref())?;
//! // ... record ...
//! cmd.end(backend.as_ref())?;
//!
//! let batch = SubmitBatch::unsynchronized(pool.pending(QueueKind::Graphics));
//! backend.submit(QueueKind::Graphics, &batch, vk::Fence::null())?;
//! pool.submit_graphics();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, trace};

use crate::backend::{GpuBackend, QueueKind};
use crate::error::{RhiError, RhiResult};

/// Non-owning handle to a pooled command buffer.
///
/// The buffer itself belongs to a [`CommandBufferAllocator`]; the handle is
/// a capability to record into it. Ending recording invalidates the handle,
/// so a closed buffer cannot be recorded into again by accident.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandBufferHandle {
    buffer: vk::CommandBuffer,
    queue: QueueKind,
    open: bool,
}

impl Default for CommandBufferHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl CommandBufferHandle {
    fn new(buffer: vk::CommandBuffer, queue: QueueKind) -> Self {
        Self {
            buffer,
            queue,
            open: false,
        }
    }

    /// An invalid handle.
    pub fn null() -> Self {
        Self {
            buffer: vk::CommandBuffer::null(),
            queue: QueueKind::Graphics,
            open: false,
        }
    }

    /// Whether the handle still refers to a buffer.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.buffer != vk::CommandBuffer::null()
    }

    /// Whether the buffer is in the recording state.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    #[inline]
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Returns the raw buffer if it is open for recording.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CommandBufferClosed`] otherwise.
    pub fn recording(&self) -> RhiResult<vk::CommandBuffer> {
        if self.open {
            Ok(self.buffer)
        } else {
            Err(RhiError::CommandBufferClosed)
        }
    }

    /// Begins recording.
    ///
    /// # Errors
    ///
    /// Fails if the handle is invalid or already open, or if the driver
    /// rejects the call.
    pub fn begin(&mut self, backend: &dyn GpuBackend) -> RhiResult<()> {
        if !self.is_valid() {
            return Err(RhiError::InvalidHandle(
                "cannot begin a null command buffer".to_string(),
            ));
        }
        if self.open {
            return Err(RhiError::InvalidHandle(
                "command buffer is already recording".to_string(),
            ));
        }
        backend.begin_command_buffer(self.buffer)?;
        self.open = true;
        Ok(())
    }

    /// Ends recording and invalidates the handle.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CommandBufferClosed`] if the buffer is not open.
    pub fn end(&mut self, backend: &dyn GpuBackend) -> RhiResult<()> {
        let buffer = self.recording()?;
        backend.end_command_buffer(buffer)?;
        *self = Self::null();
        Ok(())
    }
}

/// Buffers of one queue kind within a slot.
#[derive(Debug, Default)]
struct BufferList {
    /// Every buffer ever allocated for this slot.
    buffers: Vec<vk::CommandBuffer>,
    /// Watermark: buffers handed out since the last reset.
    used: usize,
    /// Buffers handed out since the last submission.
    pending: Vec<vk::CommandBuffer>,
    /// Submitted work not yet known to be retired.
    in_flight: bool,
}

impl BufferList {
    fn acquire(
        &mut self,
        backend: &dyn GpuBackend,
        pool: vk::CommandPool,
    ) -> RhiResult<vk::CommandBuffer> {
        let buffer = if self.used < self.buffers.len() {
            self.buffers[self.used]
        } else {
            let buffer = backend.allocate_command_buffer(pool)?;
            self.buffers.push(buffer);
            buffer
        };
        self.used += 1;
        self.pending.push(buffer);
        Ok(buffer)
    }

    fn reset(&mut self, backend: &dyn GpuBackend) -> RhiResult<()> {
        for &buffer in &self.buffers {
            backend.reset_command_buffer(buffer)?;
        }
        self.used = 0;
        self.pending.clear();
        Ok(())
    }

    fn mark_submitted(&mut self) {
        if !self.pending.is_empty() {
            self.in_flight = true;
        }
        self.pending.clear();
    }

    fn free(&mut self, backend: &dyn GpuBackend, pool: vk::CommandPool) {
        backend.free_command_buffers(pool, &self.buffers);
        self.buffers.clear();
        self.pending.clear();
        self.used = 0;
        self.in_flight = false;
    }
}

/// Command buffers owned by one frame slot.
#[derive(Debug, Default)]
pub struct CommandBufferAllocator {
    graphics: BufferList,
    compute: BufferList,
    visits: u64,
}

impl CommandBufferAllocator {
    fn list(&self, queue: QueueKind) -> &BufferList {
        match queue {
            QueueKind::Graphics => &self.graphics,
            QueueKind::Compute => &self.compute,
        }
    }

    fn list_mut(&mut self, queue: QueueKind) -> &mut BufferList {
        match queue {
            QueueKind::Graphics => &mut self.graphics,
            QueueKind::Compute => &mut self.compute,
        }
    }

    /// Number of physical buffers allocated for `queue`.
    pub fn allocated(&self, queue: QueueKind) -> usize {
        self.list(queue).buffers.len()
    }

    /// Number of buffers handed out since the slot was last made current.
    pub fn used(&self, queue: QueueKind) -> usize {
        self.list(queue).used
    }

    /// Whether work submitted from this slot on `queue` may still be executing.
    pub fn is_in_flight(&self, queue: QueueKind) -> bool {
        self.list(queue).in_flight
    }

    /// Number of times the slot has been made current.
    pub fn visits(&self) -> u64 {
        self.visits
    }
}

/// Owner of the physical command pools and every frame slot's buffers.
///
/// # Thread Safety
///
/// Vulkan command pools require external synchronization, so all
/// operations take `&mut self`. Worker threads record into buffers handed
/// out here but never allocate from the pool directly.
pub struct CommandPool {
    backend: Arc<dyn GpuBackend>,
    graphics_pool: vk::CommandPool,
    compute_pool: vk::CommandPool,
    allocators: Vec<CommandBufferAllocator>,
    current: Option<usize>,
    destroyed: bool,
}

impl CommandPool {
    /// Creates the graphics and compute pools.
    ///
    /// Both pools allow resetting individual buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if either pool cannot be created.
    pub fn new(backend: Arc<dyn GpuBackend>) -> RhiResult<Self> {
        let graphics_pool = backend.create_command_pool(QueueKind::Graphics)?;
        let compute_pool = match backend.create_command_pool(QueueKind::Compute) {
            Ok(pool) => pool,
            Err(e) => {
                backend.destroy_command_pool(graphics_pool);
                return Err(e);
            }
        };

        info!("Command pool ready (graphics + compute)");

        Ok(Self {
            backend,
            graphics_pool,
            compute_pool,
            allocators: Vec::new(),
            current: None,
            destroyed: false,
        })
    }

    fn pool(&self, queue: QueueKind) -> vk::CommandPool {
        match queue {
            QueueKind::Graphics => self.graphics_pool,
            QueueKind::Compute => self.compute_pool,
        }
    }

    /// Makes `slot` the current frame slot.
    ///
    /// The first time a slot is seen its allocator is created. On later
    /// visits every buffer the slot owns is reset to the initial state and
    /// the watermark returns to zero.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SlotInFlight`] if work submitted from the slot
    /// has not been retired with [`CommandPool::retire_frame`], or the
    /// driver error if a reset fails.
    pub fn set_current_frame(&mut self, slot: usize) -> RhiResult<()> {
        if slot >= self.allocators.len() {
            self.allocators
                .resize_with(slot + 1, CommandBufferAllocator::default);
            debug!("Command pool grew to {} frame slot(s)", self.allocators.len());
        }

        let allocator = &mut self.allocators[slot];
        if allocator.graphics.in_flight || allocator.compute.in_flight {
            return Err(RhiError::SlotInFlight { slot });
        }

        if allocator.visits > 0 {
            allocator.graphics.reset(self.backend.as_ref())?;
            allocator.compute.reset(self.backend.as_ref())?;
            trace!(
                "Reset {} graphics / {} compute command buffer(s) for slot {}",
                allocator.graphics.buffers.len(),
                allocator.compute.buffers.len(),
                slot
            );
        }
        allocator.visits += 1;
        self.current = Some(slot);
        Ok(())
    }

    /// Declares that the GPU has finished all work submitted from `slot` on
    /// `queue`.
    ///
    /// Call this only after waiting on a fence (or queue idle) that covers
    /// the slot's submissions.
    pub fn retire_frame(&mut self, slot: usize, queue: QueueKind) {
        if let Some(allocator) = self.allocators.get_mut(slot) {
            allocator.list_mut(queue).in_flight = false;
        }
    }

    /// Clears the current slot. Buffers can't be requested until the next
    /// [`CommandPool::set_current_frame`].
    pub fn frame_flip(&mut self) {
        self.current = None;
    }

    /// The current frame slot, if any.
    pub fn current_frame(&self) -> Option<usize> {
        self.current
    }

    fn acquire(&mut self, queue: QueueKind) -> RhiResult<CommandBufferHandle> {
        let slot = self.current.ok_or(RhiError::NoCurrentFrame)?;
        let pool = self.pool(queue);
        let backend = Arc::clone(&self.backend);
        let list = self.allocators[slot].list_mut(queue);
        let before = list.buffers.len();
        let buffer = list.acquire(backend.as_ref(), pool)?;
        if list.buffers.len() > before {
            debug!(
                "Allocated {} command buffer #{} for slot {}",
                queue.name(),
                before,
                slot
            );
        }
        Ok(CommandBufferHandle::new(buffer, queue))
    }

    /// Hands out a graphics command buffer for the current slot.
    ///
    /// Reuses a previously allocated buffer while the watermark is below
    /// the slot's allocation count; allocates a new one otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoCurrentFrame`] between frames, or the driver
    /// error if allocation fails.
    pub fn graphics_command_buffer(&mut self) -> RhiResult<CommandBufferHandle> {
        self.acquire(QueueKind::Graphics)
    }

    /// Hands out a compute command buffer for the current slot.
    ///
    /// See [`CommandPool::graphics_command_buffer`].
    pub fn compute_command_buffer(&mut self) -> RhiResult<CommandBufferHandle> {
        self.acquire(QueueKind::Compute)
    }

    /// Buffers handed out for `queue` since the last submission, in
    /// hand-out order. Empty when no slot is current.
    pub fn pending(&self, queue: QueueKind) -> &[vk::CommandBuffer] {
        match self.current {
            Some(slot) => &self.allocators[slot].list(queue).pending,
            None => &[],
        }
    }

    /// Records that the pending graphics buffers have been submitted.
    ///
    /// The buffers stay allocated; they are reset on the slot's next visit.
    pub fn submit_graphics(&mut self) {
        self.mark_submitted(QueueKind::Graphics);
    }

    /// Records that the pending compute buffers have been submitted.
    pub fn submit_compute(&mut self) {
        self.mark_submitted(QueueKind::Compute);
    }

    fn mark_submitted(&mut self, queue: QueueKind) {
        if let Some(slot) = self.current {
            self.allocators[slot].list_mut(queue).mark_submitted();
        }
    }

    /// Allocator of `slot`, if the slot has been made current before.
    pub fn allocator(&self, slot: usize) -> Option<&CommandBufferAllocator> {
        self.allocators.get(slot)
    }

    /// Number of slots that have allocators.
    pub fn slot_count(&self) -> usize {
        self.allocators.len()
    }

    /// Frees every command buffer of every slot, then destroys both pools.
    ///
    /// The caller must ensure the device is idle. Calling this more than
    /// once is a no-op.
    pub fn clean_up(&mut self) {
        if self.destroyed {
            return;
        }
        let backend = Arc::clone(&self.backend);
        for allocator in &mut self.allocators {
            allocator.graphics.free(backend.as_ref(), self.graphics_pool);
            allocator.compute.free(backend.as_ref(), self.compute_pool);
        }
        self.allocators.clear();
        backend.destroy_command_pool(self.graphics_pool);
        backend.destroy_command_pool(self.compute_pool);
        self.current = None;
        self.destroyed = true;
        info!("Command pool destroyed");
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.clean_up();
    }
}
