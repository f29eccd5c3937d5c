//! Frame orchestration and synchronization.
//!
//! This module provides the [`FrameOrchestrator`], which drives the frame
//! loop. It handles:
//!
//! - Per-slot fences and semaphores for N frames in flight
//! - Swapchain image acquisition and presentation
//! - Per-thread command buffer recording
//! - Out-of-frame recording for one-time uploads
//! - Per-frame object buffer uploads
//!
//! # Overview
//!
//! Each frame slot owns a fence, an image-available semaphore, a
//! render-finished semaphore and a command buffer allocator. While the GPU
//! renders frame N the CPU records frame N+1 into another slot; the fence
//! wait in [`FrameOrchestrator::start_frame`] stops the CPU from running
//! more than N-1 frames ahead.
//!
//! ```text
//! start_frame:      wait fence -> acquire image -> reset slot buffers
//!                   -> upload objects -> reset fence
//! record:           begin_recording_graphics -> commit_states -> draws -> end_recording
//! submit_with_sync: wait image_available @ COLOR_ATTACHMENT_OUTPUT,
//!                   signal render_finished + slot fence
//! flip:             present waiting on render_finished
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_core::EngineConfig;
//! use vkframe_renderer::FrameOrchestrator;
//! use vkframe_rhi::backend::GpuBackend;
//! use vkframe_rhi::swapchain::Swapchain;
//!
//! # fn example(
//! #     backend: Arc<dyn GpuBackend>,
//! #     swapchain: Swapchain,
//! # ) -> vkframe_renderer::EngineResult<()> {
//! let mut frames = FrameOrchestrator::new(backend, swapchain, EngineConfig::default())?;
//!
//! loop {
//!     frames.start_frame()?;
//!     frames.begin_recording_graphics()?;
//!
//!     frames.bind_swapchain_target(0)?;
//!     frames.commit_states()?;
//!     frames.begin_render_pass()?;
//!     frames.draw(3, 1, 0, 0)?;
//!     frames.end_render_pass()?;
//!
//!     frames.end_recording()?;
//!     frames.submit_with_sync()?;
//!     if frames.flip()? {
//!         // Recreate the swapchain, then frames.replace_swapchain(...)
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use tracing::{debug, error, info, trace, warn};

use vkframe_core::{EngineConfig, FrameStats, FrameTimer, WindingOrder};
use vkframe_rhi::RhiError;
use vkframe_rhi::backend::{GpuBackend, QueueKind, SubmitBatch};
use vkframe_rhi::command::CommandPool;
use vkframe_rhi::pipeline::{ColorBlendAttachment, CullMode, FrontFace};
use vkframe_rhi::swapchain::Swapchain;
use vkframe_rhi::sync::FrameSync;

use crate::cache::PipelineStateCache;
use crate::error::{EngineError, EngineResult};
use crate::frame::FramePhase;
use crate::objects::ObjectRing;
use crate::recording::{RecordingSlots, recording_thread};
use crate::registry::{ResourceId, ResourceRegistry};

/// Drives the per-frame acquire, record, submit and present sequence.
///
/// Owns the command pool, the pipeline state cache, the resource registry
/// and one [`FrameSync`] per frame slot.
///
/// # Thread Safety
///
/// All state-changing operations take `&mut self`. Worker threads each
/// bind a distinct index with
/// [`bind_recording_thread`](crate::recording::bind_recording_thread) and
/// only touch their own recording slot; recording commands take `&self`.
pub struct FrameOrchestrator {
    backend: Arc<dyn GpuBackend>,
    config: EngineConfig,
    swapchain: Swapchain,
    command_pool: CommandPool,
    cache: PipelineStateCache,
    registry: ResourceRegistry,
    frames: Vec<FrameSync>,
    frame_index: usize,
    phase: FramePhase,
    recording: RecordingSlots,
    objects: Option<ObjectRing>,
    timer: FrameTimer,
    destroyed: bool,
}

impl FrameOrchestrator {
    /// Creates the orchestrator and its per-slot synchronization objects.
    ///
    /// Fences start signaled so the first [`FrameOrchestrator::start_frame`]
    /// for each slot does not block. Render target 0 gets alpha blending and
    /// the rasterizer settings come from `config.raster`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The device seam
    /// * `swapchain` - The current swapchain
    /// * `config` - Engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any pool or
    /// sync object cannot be created.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        swapchain: Swapchain,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        let slots = config.frames_in_flight;

        let command_pool = CommandPool::new(Arc::clone(&backend))?;

        let mut frames = Vec::with_capacity(slots);
        for slot in 0..slots {
            frames.push(FrameSync::new(Arc::clone(&backend))?);
            debug!("Created sync objects for frame slot {}", slot);
        }

        let mut cache = PipelineStateCache::new(Arc::clone(&backend));
        cache.set_cull_mode(if config.raster.cull_back_faces {
            CullMode::Back
        } else {
            CullMode::None
        });
        cache.set_front_face(match config.raster.front_face {
            WindingOrder::Clockwise => FrontFace::Clockwise,
            WindingOrder::CounterClockwise => FrontFace::CounterClockwise,
        });
        cache.set_rt_blend_state(0, ColorBlendAttachment::alpha_blend())?;

        let recording = RecordingSlots::new(config.recording_threads);

        info!(
            "Frame orchestrator created with {} frame(s) in flight, {} recording thread(s)",
            slots, config.recording_threads
        );

        Ok(Self {
            backend,
            swapchain,
            command_pool,
            cache,
            registry: ResourceRegistry::new(),
            frames,
            frame_index: slots - 1,
            phase: FramePhase::Idle,
            recording,
            objects: None,
            timer: FrameTimer::new(),
            destroyed: false,
            config,
        })
    }

    fn expect_phase(
        &self,
        operation: &'static str,
        allowed: impl FnOnce(FramePhase) -> bool,
    ) -> EngineResult<()> {
        if allowed(self.phase) {
            Ok(())
        } else {
            Err(EngineError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    /// Maps a `TIMEOUT` from a fence wait or image acquire on `slot` to
    /// [`RhiError::FenceTimeout`].
    fn timed_out<T>(
        &self,
        slot: usize,
        waiting_for: &'static str,
        result: Result<T, RhiError>,
    ) -> EngineResult<T> {
        match result {
            Err(RhiError::Vulkan(vk::Result::TIMEOUT)) => {
                let timeout_ms = self.config.fence_timeout_ms;
                error!(
                    "Frame slot {} {} did not complete within {} ms",
                    slot, waiting_for, timeout_ms
                );
                Err(RhiError::FenceTimeout { slot, timeout_ms }.into())
            }
            other => Ok(other?),
        }
    }

    /// Retires `slot` on `queue` if it still has work marked in flight,
    /// waiting for the queue to drain first.
    fn drain_slot(&mut self, slot: usize, queue: QueueKind) -> EngineResult<()> {
        let in_flight = self
            .command_pool
            .allocator(slot)
            .is_some_and(|allocator| allocator.is_in_flight(queue));
        if in_flight {
            trace!("Waiting for {} queue idle to reuse slot {}", queue.name(), slot);
            self.backend.queue_wait_idle(queue)?;
            self.command_pool.retire_frame(slot, queue);
        }
        Ok(())
    }

    // =========================================================================
    // Frame Loop
    // =========================================================================

    /// Starts the next frame.
    ///
    /// Advances the frame index, waits on that slot's fence, acquires the
    /// next swapchain image and makes the slot current in the command pool,
    /// which resets its command buffers. An attached [`ObjectRing`] uploads
    /// into the slot's buffer. Returns the new frame slot.
    ///
    /// The fence is only reset once every step above has succeeded, so an
    /// error here leaves the slot reusable and the frame uncounted.
    ///
    /// # Errors
    ///
    /// - [`RhiError::FenceTimeout`] if the fence does not signal or no
    ///   image is available within the configured timeout
    /// - [`RhiError::SwapchainOutOfDate`] if the swapchain must be recreated
    /// - [`EngineError::InvalidPhase`] unless the previous frame was
    ///   presented (or no frame has started yet)
    pub fn start_frame(&mut self) -> EngineResult<usize> {
        self.expect_phase("start_frame", FramePhase::is_between_frames)?;

        let slot = (self.frame_index + 1) % self.frames.len();
        let timeout_ns = self.config.fence_timeout_ns();

        let wait_started = Instant::now();
        let waited = self.frames[slot].in_flight_fence().wait(timeout_ns);
        self.timed_out(slot, "fence", waited)?;
        let stall = wait_started.elapsed();
        trace!("Frame slot {} fence wait took {:?}", slot, stall);

        self.command_pool.retire_frame(slot, QueueKind::Graphics);
        // Compute submissions carry no fence of their own.
        self.drain_slot(slot, QueueKind::Compute)?;

        let acquired = self.backend.acquire_next_image(
            self.swapchain.handle(),
            self.frames[slot].image_available().handle(),
            timeout_ns,
        );
        let (image_index, suboptimal) = self.timed_out(slot, "image acquire", acquired)?;
        if suboptimal {
            warn!("Swapchain is suboptimal for the surface");
        }

        self.swapchain.set_current_image_index(image_index)?;
        self.command_pool.set_current_frame(slot)?;
        if let Some(objects) = self.objects.as_mut() {
            objects.update_buffers(slot)?;
        }
        self.frames[slot].in_flight_fence().reset()?;

        self.timer.begin_frame();
        self.timer.record_fence_wait(stall);
        self.frame_index = slot;
        self.phase = FramePhase::Acquired;
        trace!("Started frame slot {} on image {}", slot, image_index);
        Ok(slot)
    }

    fn begin_recording(&mut self, queue: QueueKind) -> EngineResult<()> {
        self.expect_phase("begin_recording", FramePhase::accepts_recording)?;
        let thread = recording_thread();
        self.recording.ensure_free(thread)?;

        let mut handle = match queue {
            QueueKind::Graphics => self.command_pool.graphics_command_buffer()?,
            QueueKind::Compute => self.command_pool.compute_command_buffer()?,
        };
        handle.begin(self.backend.as_ref())?;
        self.recording.open(thread, handle)?;

        if self.phase == FramePhase::Acquired {
            self.phase = FramePhase::Recording;
        }
        trace!("Thread {} began {} recording", thread, queue.name());
        Ok(())
    }

    /// Opens a graphics command buffer for the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandBufferAlreadyOpen`] if the thread is
    /// already recording, [`EngineError::RecordingThread`] if its index is
    /// outside the configured slots, or [`EngineError::InvalidPhase`]
    /// outside a frame.
    pub fn begin_recording_graphics(&mut self) -> EngineResult<()> {
        self.begin_recording(QueueKind::Graphics)
    }

    /// Opens a compute command buffer for the calling thread.
    ///
    /// See [`FrameOrchestrator::begin_recording_graphics`].
    pub fn begin_recording_compute(&mut self) -> EngineResult<()> {
        self.begin_recording(QueueKind::Compute)
    }

    /// Ends the calling thread's command buffer and clears its slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoOpenCommandBuffer`] if the thread has
    /// nothing open.
    pub fn end_recording(&mut self) -> EngineResult<()> {
        let thread = recording_thread();
        let mut handle = self.recording.take(thread)?;
        handle.end(self.backend.as_ref())?;
        trace!("Thread {} ended recording", thread);
        Ok(())
    }

    /// Raw handle of the calling thread's open command buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoOpenCommandBuffer`] if the thread has
    /// nothing open.
    pub fn current_command_buffer(&self) -> EngineResult<vk::CommandBuffer> {
        let handle = self.recording.current(recording_thread())?;
        Ok(handle.recording()?)
    }

    /// Resolves the current pipeline state and binds it into the calling
    /// thread's command buffer, sized to the swapchain extent.
    pub fn commit_states(&mut self) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.cache.commit_states(cmd, self.swapchain.vk_extent())?;
        Ok(())
    }

    /// Begins the cached render pass for the bound render targets.
    pub fn begin_render_pass(&mut self) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        let begin = self.cache.render_pass_begin(self.swapchain.vk_extent())?;
        self.backend.cmd_begin_render_pass(cmd, &begin);
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend.cmd_end_render_pass(cmd);
        Ok(())
    }

    fn ensure_not_recording(&self) -> EngineResult<()> {
        if self.recording.any_open() {
            return Err(EngineError::RecordingInProgress);
        }
        Ok(())
    }

    fn submit_unsynchronized(&mut self, queue: QueueKind) -> EngineResult<()> {
        self.expect_phase("submit", FramePhase::accepts_recording)?;
        self.ensure_not_recording()?;

        let buffers = self.command_pool.pending(queue);
        if buffers.is_empty() {
            trace!("Nothing to submit on {} queue", queue.name());
            return Ok(());
        }
        self.backend.submit(
            queue,
            &SubmitBatch::unsynchronized(buffers),
            vk::Fence::null(),
        )?;
        trace!("Submitted {} {} buffer(s) without sync", buffers.len(), queue.name());

        match queue {
            QueueKind::Graphics => self.command_pool.submit_graphics(),
            QueueKind::Compute => self.command_pool.submit_compute(),
        }
        Ok(())
    }

    /// Submits the current slot's graphics buffers with no semaphores or
    /// fence. Used for setup transfers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RecordingInProgress`] if any thread still has
    /// a buffer open.
    pub fn submit(&mut self) -> EngineResult<()> {
        self.submit_unsynchronized(QueueKind::Graphics)
    }

    /// Submits the current slot's compute buffers to the compute queue
    /// with no semaphores or fence.
    pub fn submit_compute(&mut self) -> EngineResult<()> {
        self.submit_unsynchronized(QueueKind::Compute)
    }

    /// Submits the frame's graphics buffers.
    ///
    /// The submission waits on the slot's image-available semaphore at the
    /// color-attachment-output stage, signals its render-finished semaphore
    /// and signals its fence. It is issued even when no buffers were
    /// recorded, so the fence the next visit waits on always signals.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RecordingInProgress`] if any thread still has
    /// a buffer open, or [`EngineError::InvalidPhase`] outside a frame.
    pub fn submit_with_sync(&mut self) -> EngineResult<()> {
        self.expect_phase("submit_with_sync", |phase| {
            matches!(phase, FramePhase::Acquired | FramePhase::Recording)
        })?;
        self.ensure_not_recording()?;

        let sync = &self.frames[self.frame_index];
        let wait_semaphores = [sync.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished().handle()];
        let command_buffers = self.command_pool.pending(QueueKind::Graphics);

        self.backend.submit(
            QueueKind::Graphics,
            &SubmitBatch {
                command_buffers,
                wait_semaphores: &wait_semaphores,
                wait_stages: &wait_stages,
                signal_semaphores: &signal_semaphores,
            },
            sync.in_flight_fence().handle(),
        )?;
        trace!(
            "Submitted frame slot {} with {} buffer(s)",
            self.frame_index,
            command_buffers.len()
        );

        self.command_pool.submit_graphics();
        self.phase = FramePhase::Submitted;
        Ok(())
    }

    /// Presents the current image, then ends the frame: the command pool
    /// loses its current slot and transient registry entries are dropped.
    ///
    /// Returns `true` if the swapchain is out of date or suboptimal and
    /// should be recreated.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] unless the frame was submitted
    /// with [`FrameOrchestrator::submit_with_sync`].
    pub fn flip(&mut self) -> EngineResult<bool> {
        self.expect_phase("flip", |phase| phase == FramePhase::Submitted)?;

        let needs_resize = self.backend.present(
            self.swapchain.handle(),
            self.swapchain.current_image_index(),
            self.frames[self.frame_index].render_finished().handle(),
        )?;
        if needs_resize {
            debug!("Swapchain needs recreation after present");
        }

        self.command_pool.frame_flip();
        self.registry.clean_up_frame();
        self.phase = FramePhase::Presented;
        Ok(needs_resize)
    }

    // =========================================================================
    // Out-of-frame Recording
    // =========================================================================

    /// Slot index used for out-of-frame recording.
    #[inline]
    pub fn out_of_frame_slot(&self) -> usize {
        self.frames.len()
    }

    /// Makes the out-of-frame slot current for one-time uploads.
    ///
    /// Opens nothing: record with [`FrameOrchestrator::begin_recording_graphics`]
    /// and friends, then [`FrameOrchestrator::submit`] as often as needed.
    /// The slot sits past the frame slots, so its buffers are never reset
    /// by the frame loop. If earlier out-of-frame work is still marked in
    /// flight, waits for the queues to go idle first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] while a frame is in progress.
    pub fn begin_out_of_frame_recording(&mut self) -> EngineResult<()> {
        self.expect_phase(
            "begin_out_of_frame_recording",
            FramePhase::is_between_frames,
        )?;
        let slot = self.out_of_frame_slot();
        self.drain_slot(slot, QueueKind::Graphics)?;
        self.drain_slot(slot, QueueKind::Compute)?;

        self.command_pool.set_current_frame(slot)?;
        self.phase = FramePhase::OutOfFrame;
        debug!("Began out-of-frame recording");
        Ok(())
    }

    /// Leaves out-of-frame recording.
    ///
    /// Ends the calling thread's buffer if it is still open, submits any
    /// graphics or compute work not yet submitted without sync and leaves
    /// the pool with no current slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] outside out-of-frame recording,
    /// or [`EngineError::RecordingInProgress`] if another thread still has
    /// a buffer open.
    pub fn end_out_of_frame_recording(&mut self) -> EngineResult<()> {
        self.expect_phase("end_out_of_frame_recording", |phase| {
            phase == FramePhase::OutOfFrame
        })?;
        if self.recording.current(recording_thread()).is_ok() {
            self.end_recording()?;
        }
        self.submit_unsynchronized(QueueKind::Graphics)?;
        self.submit_unsynchronized(QueueKind::Compute)?;

        self.command_pool.frame_flip();
        self.phase = FramePhase::Idle;
        debug!("Ended out-of-frame recording");
        Ok(())
    }

    // =========================================================================
    // Object Buffers
    // =========================================================================

    /// Attaches a per-frame object ring. From the next
    /// [`FrameOrchestrator::start_frame`] on, each frame uploads the object
    /// list into its slot's buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ObjectRingSlots`] unless the ring has one
    /// buffer per frame in flight, or [`EngineError::InvalidPhase`] while a
    /// frame is in progress.
    pub fn attach_objects(&mut self, objects: ObjectRing) -> EngineResult<()> {
        self.expect_phase("attach_objects", FramePhase::is_between_frames)?;
        if objects.slot_count() != self.frames.len() {
            return Err(EngineError::ObjectRingSlots {
                buffers: objects.slot_count(),
                frames: self.frames.len(),
            });
        }
        debug!("Attached {:?}", objects);
        self.objects = Some(objects);
        Ok(())
    }

    pub fn objects(&self) -> Option<&ObjectRing> {
        self.objects.as_ref()
    }

    /// The object ring, for adding or updating objects between uploads.
    pub fn objects_mut(&mut self) -> Option<&mut ObjectRing> {
        self.objects.as_mut()
    }

    /// Re-uploads the object list into the current frame's buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoObjectRing`] without an attached ring or
    /// [`EngineError::InvalidPhase`] outside a frame.
    pub fn update_objects(&mut self) -> EngineResult<()> {
        self.expect_phase("update_objects", |phase| {
            matches!(phase, FramePhase::Acquired | FramePhase::Recording)
        })?;
        let slot = self.frame_index;
        self.objects
            .as_mut()
            .ok_or(EngineError::NoObjectRing)?
            .update_buffers(slot)
    }

    /// Binds the current frame's object buffer into the pipeline state's
    /// structured-buffer set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoObjectRing`] without an attached ring.
    pub fn bind_object_buffer(&mut self) -> EngineResult<()> {
        let binding = self
            .objects
            .as_ref()
            .ok_or(EngineError::NoObjectRing)?
            .current_binding()?;
        self.cache.bind_structured_buffer(binding);
        Ok(())
    }

    // =========================================================================
    // Render Targets
    // =========================================================================

    /// Binds the current swapchain image as render target `index`.
    pub fn bind_swapchain_target(&mut self, index: usize) -> EngineResult<()> {
        self.cache
            .set_render_target(index, self.swapchain.current_image_view())
    }

    /// Binds the view registered under `id` as render target `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownResource`] if the registry has no
    /// entry for `id`.
    pub fn set_render_target_by_id(&mut self, index: usize, id: ResourceId) -> EngineResult<()> {
        let view = self.registry.image_view(id)?;
        self.cache.set_render_target(index, view)
    }

    // =========================================================================
    // Recording Commands
    // =========================================================================

    pub fn bind_vertex_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
    ) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend.cmd_bind_vertex_buffer(cmd, buffer, offset);
        Ok(())
    }

    pub fn bind_index_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend
            .cmd_bind_index_buffer(cmd, buffer, offset, index_type);
        Ok(())
    }

    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend
            .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance);
        Ok(())
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend.cmd_draw_indexed(
            cmd,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
        Ok(())
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend.cmd_dispatch(cmd, x, y, z);
        Ok(())
    }

    /// Records a buffer-to-buffer copy, typically staging to device-local
    /// memory during out-of-frame recording.
    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) -> EngineResult<()> {
        let cmd = self.current_command_buffer()?;
        self.backend.cmd_copy_buffer(cmd, src, dst, regions);
        Ok(())
    }

    // =========================================================================
    // Swapchain and Teardown
    // =========================================================================

    /// Swaps in an externally recreated swapchain.
    ///
    /// Waits for the device to go idle, retires every slot and drops the
    /// cached objects, which were built against the old image views.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] while a frame is in progress.
    pub fn replace_swapchain(&mut self, swapchain: Swapchain) -> EngineResult<()> {
        self.expect_phase("replace_swapchain", FramePhase::is_between_frames)?;
        self.backend.wait_idle()?;
        for slot in 0..self.command_pool.slot_count() {
            self.command_pool.retire_frame(slot, QueueKind::Graphics);
            self.command_pool.retire_frame(slot, QueueKind::Compute);
        }
        self.cache.clear();
        self.cache.reset_render_targets();

        let extent = swapchain.vk_extent();
        self.swapchain = swapchain;
        info!(
            "Swapchain replaced ({}x{}, {} image(s))",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Waits for the device to go idle and destroys every owned GPU object.
    ///
    /// Safe to call more than once; also called on drop.
    pub fn clean_up(&mut self) {
        if self.destroyed {
            return;
        }
        if let Err(e) = self.backend.wait_idle() {
            warn!("Device wait idle failed during teardown: {}", e);
        }
        self.recording.clear();
        self.objects = None;
        self.cache.clean_up();
        self.command_pool.clean_up();
        self.frames.clear();
        self.registry.clear();
        self.destroyed = true;
        info!("Frame orchestrator destroyed");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current frame slot.
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Sync objects of `slot`.
    pub fn frame_sync(&self, slot: usize) -> Option<&FrameSync> {
        self.frames.get(slot)
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    #[inline]
    pub fn cache(&self) -> &PipelineStateCache {
        &self.cache
    }

    /// The pipeline state cache, for setting state before a commit.
    #[inline]
    pub fn cache_mut(&mut self) -> &mut PipelineStateCache {
        &mut self.cache
    }

    #[inline]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// Frame pacing statistics.
    pub fn frame_stats(&self) -> FrameStats {
        self.timer.stats()
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        self.clean_up();
    }
}
