//! In-memory [`GpuBackend`] for tests.
//!
//! `MockBackend` hands out fake handles from a counter and records every
//! call, so tests can assert on allocation, reset, build and wait counts
//! without a GPU. Fences are simulated: a submit with a fence signals it
//! immediately unless auto-completion is turned off, in which case the
//! fence stays pending until [`MockBackend::complete_pending`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk;
use ash::vk::Handle;

use crate::backend::{GpuBackend, QueueKind, SubmitBatch};
use crate::descriptor::{DescriptorBinding, StructuredBuffer};
use crate::error::{RhiError, RhiResult};
use crate::pipeline::{ComputePipelineDesc, GraphicsPipelineDesc};
use crate::rendering::{FramebufferDesc, RenderPassBegin, RenderPassDesc};

/// Call counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    pub command_pools_created: usize,
    pub command_pools_destroyed: usize,
    pub live_command_pools: usize,
    pub command_buffers_allocated: usize,
    pub command_buffer_resets: usize,
    pub command_buffers_freed: usize,
    pub command_buffers_begun: usize,
    pub command_buffers_ended: usize,
    pub fence_waits: usize,
    pub fence_resets: usize,
    pub live_sync_objects: usize,
    pub pipeline_layouts_built: usize,
    pub render_passes_built: usize,
    pub framebuffers_built: usize,
    pub graphics_pipelines_built: usize,
    pub compute_pipelines_built: usize,
    pub live_cached_objects: usize,
    pub acquires: usize,
    pub queue_idle_waits: usize,
    pub device_idle_waits: usize,
}

/// A recorded pipeline creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineBuild {
    pub pipeline: vk::Pipeline,
    pub bind_point: vk::PipelineBindPoint,
    pub stage_count: u32,
    pub color_attachments: usize,
    pub layout: vk::PipelineLayout,
}

/// A recorded queue submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRecord {
    pub queue: QueueKind,
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
}

/// A recorded present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentRecord {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait: vk::Semaphore,
}

/// A command recorded into a command buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        clear_colors: Vec<[f32; 4]>,
    },
    EndRenderPass,
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSet {
        bind_point: vk::PipelineBindPoint,
        set_index: u32,
        set: vk::DescriptorSet,
    },
    SetViewport {
        width: f32,
        height: f32,
    },
    SetScissor {
        width: u32,
        height: u32,
    },
    BindVertexBuffer(vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: usize,
    },
}

#[derive(Debug, Default)]
struct MockFence {
    signaled: bool,
    waits: usize,
}

#[derive(Debug)]
struct MockState {
    next_handle: u64,
    stats: MockStats,
    fences: HashMap<vk::Fence, MockFence>,
    pending_fences: Vec<vk::Fence>,
    auto_complete: bool,
    image_count: u32,
    next_image: u32,
    acquire_failure: Option<vk::Result>,
    fail_next_reset: bool,
    submits: Vec<SubmitRecord>,
    presents: Vec<PresentRecord>,
    pipelines: Vec<PipelineBuild>,
    pipeline_layouts: Vec<Vec<vk::DescriptorSetLayout>>,
    render_passes: Vec<RenderPassDesc>,
    framebuffers: Vec<FramebufferDesc>,
    commands: Vec<(vk::CommandBuffer, RecordedCommand)>,
}

impl MockState {
    fn next_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Recording [`GpuBackend`] with simulated fences.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Mock with three swapchain images and auto-completing fences.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 0x1000,
                stats: MockStats::default(),
                fences: HashMap::new(),
                pending_fences: Vec::new(),
                auto_complete: true,
                image_count: 3,
                next_image: 0,
                acquire_failure: None,
                fail_next_reset: false,
                submits: Vec::new(),
                presents: Vec::new(),
                pipelines: Vec::new(),
                pipeline_layouts: Vec::new(),
                render_passes: Vec::new(),
                framebuffers: Vec::new(),
                commands: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of images acquire cycles through.
    pub fn set_image_count(&self, count: u32) {
        self.state().image_count = count.max(1);
    }

    /// When false, fences submitted with work stay unsignaled until
    /// [`MockBackend::complete_pending`].
    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.state().auto_complete = auto_complete;
    }

    /// Signals every fence submitted while auto-completion was off.
    pub fn complete_pending(&self) {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending_fences);
        for fence in pending {
            if let Some(f) = state.fences.get_mut(&fence) {
                f.signaled = true;
            }
        }
    }

    /// Makes the next acquire report an out-of-date swapchain.
    pub fn fail_next_acquire(&self) {
        self.state().acquire_failure = Some(vk::Result::ERROR_OUT_OF_DATE_KHR);
    }

    /// Makes the next acquire give up with `VK_TIMEOUT`.
    pub fn time_out_next_acquire(&self) {
        self.state().acquire_failure = Some(vk::Result::TIMEOUT);
    }

    /// Makes the next command buffer reset fail with
    /// `VK_ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn fail_next_command_buffer_reset(&self) {
        self.state().fail_next_reset = true;
    }

    pub fn stats(&self) -> MockStats {
        self.state().stats.clone()
    }

    /// Number of waits issued on `fence`.
    pub fn fence_wait_count(&self, fence: vk::Fence) -> usize {
        self.state().fences.get(&fence).map_or(0, |f| f.waits)
    }

    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state().fences.get(&fence).is_some_and(|f| f.signaled)
    }

    pub fn submits(&self) -> Vec<SubmitRecord> {
        self.state().submits.clone()
    }

    pub fn presents(&self) -> Vec<PresentRecord> {
        self.state().presents.clone()
    }

    pub fn pipeline_builds(&self) -> Vec<PipelineBuild> {
        self.state().pipelines.clone()
    }

    /// Set layouts passed to each pipeline layout creation.
    pub fn pipeline_layout_builds(&self) -> Vec<Vec<vk::DescriptorSetLayout>> {
        self.state().pipeline_layouts.clone()
    }

    pub fn render_pass_builds(&self) -> Vec<RenderPassDesc> {
        self.state().render_passes.clone()
    }

    pub fn framebuffer_builds(&self) -> Vec<FramebufferDesc> {
        self.state().framebuffers.clone()
    }

    /// Commands recorded into `buffer`, in order.
    pub fn commands(&self, buffer: vk::CommandBuffer) -> Vec<RecordedCommand> {
        self.state()
            .commands
            .iter()
            .filter(|(b, _)| *b == buffer)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Every recorded command, in order.
    pub fn all_commands(&self) -> Vec<RecordedCommand> {
        self.state()
            .commands
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn record(&self, buffer: vk::CommandBuffer, command: RecordedCommand) {
        self.state().commands.push((buffer, command));
    }

    fn build_cached<T: Handle>(&self, count: impl FnOnce(&mut MockStats)) -> T {
        let mut state = self.state();
        count(&mut state.stats);
        state.stats.live_cached_objects += 1;
        T::from_raw(state.next_raw())
    }

    fn destroy_cached(&self) {
        let mut state = self.state();
        state.stats.live_cached_objects = state.stats.live_cached_objects.saturating_sub(1);
    }
}

impl GpuBackend for MockBackend {
    fn create_command_pool(&self, _queue: QueueKind) -> RhiResult<vk::CommandPool> {
        let mut state = self.state();
        state.stats.command_pools_created += 1;
        state.stats.live_command_pools += 1;
        Ok(vk::CommandPool::from_raw(state.next_raw()))
    }

    fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        let mut state = self.state();
        state.stats.command_pools_destroyed += 1;
        state.stats.live_command_pools = state.stats.live_command_pools.saturating_sub(1);
    }

    fn allocate_command_buffer(&self, _pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer> {
        let mut state = self.state();
        state.stats.command_buffers_allocated += 1;
        Ok(vk::CommandBuffer::from_raw(state.next_raw()))
    }

    fn reset_command_buffer(&self, _buffer: vk::CommandBuffer) -> RhiResult<()> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_next_reset) {
            return Err(RhiError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        state.stats.command_buffer_resets += 1;
        Ok(())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.state().stats.command_buffers_freed += buffers.len();
    }

    fn begin_command_buffer(&self, _buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.state().stats.command_buffers_begun += 1;
        Ok(())
    }

    fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.state().stats.command_buffers_ended += 1;
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let mut state = self.state();
        let fence = vk::Fence::from_raw(state.next_raw());
        state.fences.insert(
            fence,
            MockFence {
                signaled,
                waits: 0,
            },
        );
        state.stats.live_sync_objects += 1;
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        state.fences.remove(&fence);
        state.stats.live_sync_objects = state.stats.live_sync_objects.saturating_sub(1);
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> RhiResult<()> {
        let mut state = self.state();
        state.stats.fence_waits += 1;
        let entry = state
            .fences
            .get_mut(&fence)
            .ok_or_else(|| RhiError::InvalidHandle(format!("unknown fence {fence:?}")))?;
        entry.waits += 1;
        if entry.signaled {
            Ok(())
        } else {
            Err(RhiError::Vulkan(vk::Result::TIMEOUT))
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        let mut state = self.state();
        state.stats.fence_resets += 1;
        if let Some(entry) = state.fences.get_mut(&fence) {
            entry.signaled = false;
        }
        Ok(())
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let mut state = self.state();
        state.stats.live_sync_objects += 1;
        Ok(vk::Semaphore::from_raw(state.next_raw()))
    }

    fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        let mut state = self.state();
        state.stats.live_sync_objects = state.stats.live_sync_objects.saturating_sub(1);
    }

    fn submit(
        &self,
        queue: QueueKind,
        batch: &SubmitBatch<'_>,
        fence: vk::Fence,
    ) -> RhiResult<()> {
        let mut state = self.state();
        state.submits.push(SubmitRecord {
            queue,
            command_buffers: batch.command_buffers.to_vec(),
            wait_semaphores: batch.wait_semaphores.to_vec(),
            wait_stages: batch.wait_stages.to_vec(),
            signal_semaphores: batch.signal_semaphores.to_vec(),
            fence,
        });
        if fence != vk::Fence::null() {
            if state.auto_complete {
                if let Some(entry) = state.fences.get_mut(&fence) {
                    entry.signaled = true;
                }
            } else {
                state.pending_fences.push(fence);
            }
        }
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _signal: vk::Semaphore,
        _timeout_ns: u64,
    ) -> RhiResult<(u32, bool)> {
        let mut state = self.state();
        state.stats.acquires += 1;
        match state.acquire_failure.take() {
            Some(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Err(RhiError::SwapchainOutOfDate),
            Some(result) => return Err(RhiError::Vulkan(result)),
            None => {}
        }
        let index = state.next_image;
        state.next_image = (index + 1) % state.image_count;
        Ok((index, false))
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool> {
        self.state().presents.push(PresentRecord {
            swapchain,
            image_index,
            wait,
        });
        Ok(false)
    }

    fn queue_wait_idle(&self, _queue: QueueKind) -> RhiResult<()> {
        self.state().stats.queue_idle_waits += 1;
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.state().stats.device_idle_waits += 1;
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<vk::PipelineLayout> {
        self.state().pipeline_layouts.push(set_layouts.to_vec());
        Ok(self.build_cached(|stats| stats.pipeline_layouts_built += 1))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.destroy_cached();
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass> {
        self.state().render_passes.push(desc.clone());
        Ok(self.build_cached(|stats| stats.render_passes_built += 1))
    }

    fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.destroy_cached();
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer> {
        self.state().framebuffers.push(desc.clone());
        Ok(self.build_cached(|stats| stats.framebuffers_built += 1))
    }

    fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.destroy_cached();
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RhiResult<vk::Pipeline> {
        if !desc.stages_match() {
            return Err(RhiError::PipelineError(
                "graphics pipeline needs a vertex and a fragment module".to_string(),
            ));
        }
        let pipeline: vk::Pipeline =
            self.build_cached(|stats| stats.graphics_pipelines_built += 1);
        self.state().pipelines.push(PipelineBuild {
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            stage_count: desc.stage_count(),
            color_attachments: desc.color_blend.len(),
            layout: desc.layout,
        });
        Ok(pipeline)
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> RhiResult<vk::Pipeline> {
        let pipeline: vk::Pipeline =
            self.build_cached(|stats| stats.compute_pipelines_built += 1);
        self.state().pipelines.push(PipelineBuild {
            pipeline,
            bind_point: vk::PipelineBindPoint::COMPUTE,
            stage_count: desc.stage_count(),
            color_attachments: 0,
            layout: desc.layout,
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.destroy_cached();
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.record(
            buffer,
            RecordedCommand::BeginRenderPass {
                render_pass: begin.render_pass,
                framebuffer: begin.framebuffer,
                clear_colors: begin.clear_colors.clone(),
            },
        );
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        self.record(buffer, RecordedCommand::EndRenderPass);
    }

    fn cmd_bind_pipeline(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        self.record(
            buffer,
            RecordedCommand::BindPipeline {
                bind_point,
                pipeline,
            },
        );
    }

    fn cmd_bind_descriptor_set(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) {
        self.record(
            buffer,
            RecordedCommand::BindDescriptorSet {
                bind_point,
                set_index,
                set,
            },
        );
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        self.record(
            buffer,
            RecordedCommand::SetViewport {
                width: viewport.width,
                height: viewport.height,
            },
        );
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.record(
            buffer,
            RecordedCommand::SetScissor {
                width: scissor.extent.width,
                height: scissor.extent.height,
            },
        );
    }

    fn cmd_bind_vertex_buffer(
        &self,
        buffer: vk::CommandBuffer,
        vertex_buffer: vk::Buffer,
        _offset: vk::DeviceSize,
    ) {
        self.record(buffer, RecordedCommand::BindVertexBuffer(vertex_buffer));
    }

    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        _index_type: vk::IndexType,
    ) {
        self.record(buffer, RecordedCommand::BindIndexBuffer(index_buffer));
    }

    fn cmd_draw(
        &self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.record(
            buffer,
            RecordedCommand::Draw {
                vertex_count,
                instance_count,
            },
        );
    }

    fn cmd_draw_indexed(
        &self,
        buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record(
            buffer,
            RecordedCommand::DrawIndexed {
                index_count,
                instance_count,
            },
        );
    }

    fn cmd_dispatch(&self, buffer: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        self.record(buffer, RecordedCommand::Dispatch { x, y, z });
    }

    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.record(
            buffer,
            RecordedCommand::CopyBuffer {
                src,
                dst,
                regions: regions.len(),
            },
        );
    }
}

#[derive(Debug, Default)]
struct MockBufferState {
    contents: Vec<u8>,
    writes: usize,
}

/// In-memory [`StructuredBuffer`]. Clones share the same contents, so a
/// test can keep one clone and hand the other to the code under test.
#[derive(Clone, Debug)]
pub struct MockStructuredBuffer {
    binding: DescriptorBinding,
    state: Arc<Mutex<MockBufferState>>,
}

impl MockStructuredBuffer {
    /// A zeroed buffer of `capacity` bytes whose layout and set handles
    /// are derived from `raw`.
    pub fn new(raw: u64, capacity: usize) -> Self {
        Self {
            binding: DescriptorBinding::new(
                vk::DescriptorSetLayout::from_raw(raw),
                vk::DescriptorSet::from_raw(raw + 1),
            ),
            state: Arc::new(Mutex::new(MockBufferState {
                contents: vec![0; capacity],
                writes: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockBufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contents(&self) -> Vec<u8> {
        self.state().contents.clone()
    }

    /// Number of [`StructuredBuffer::write`] calls so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

impl StructuredBuffer for MockStructuredBuffer {
    fn binding(&self) -> DescriptorBinding {
        self.binding
    }

    fn capacity(&self) -> usize {
        self.state().contents.len()
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> RhiResult<()> {
        let mut state = self.state();
        let end = offset + bytes.len();
        if end > state.contents.len() {
            return Err(RhiError::InvalidHandle(format!(
                "write of {} byte(s) at {} overflows a {} byte buffer",
                bytes.len(),
                offset,
                state.contents.len()
            )));
        }
        state.contents[offset..end].copy_from_slice(bytes);
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mock = MockBackend::new();
        let a = mock.create_semaphore().unwrap();
        let b = mock.create_semaphore().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pending_fence_completes_on_demand() {
        let mock = MockBackend::new();
        mock.set_auto_complete(false);
        let fence = mock.create_fence(false).unwrap();

        mock.submit(QueueKind::Graphics, &SubmitBatch::default(), fence)
            .unwrap();
        assert!(!mock.is_fence_signaled(fence));
        assert!(mock.wait_for_fence(fence, 0).is_err());

        mock.complete_pending();
        assert!(mock.wait_for_fence(fence, 0).is_ok());
        assert_eq!(mock.fence_wait_count(fence), 2);
    }

    #[test]
    fn test_acquire_cycles_images() {
        let mock = MockBackend::new();
        mock.set_image_count(2);
        let indices: Vec<u32> = (0..4)
            .map(|_| {
                mock.acquire_next_image(vk::SwapchainKHR::null(), vk::Semaphore::null(), 0)
                    .unwrap()
                    .0
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_acquire_timeout_is_reported_once() {
        let mock = MockBackend::new();
        mock.time_out_next_acquire();
        let acquire =
            || mock.acquire_next_image(vk::SwapchainKHR::null(), vk::Semaphore::null(), 0);
        assert!(matches!(
            acquire(),
            Err(RhiError::Vulkan(vk::Result::TIMEOUT))
        ));
        assert!(acquire().is_ok());
    }

    #[test]
    fn test_structured_buffer_clones_share_contents() {
        let buffer = MockStructuredBuffer::new(0x70, 8);
        let mut writer = buffer.clone();
        writer.write(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.contents(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(buffer.write_count(), 1);
        assert!(writer.write(6, &[0; 4]).is_err());
    }
}
