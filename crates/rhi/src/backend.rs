//! The device seam used by the frame core.
//!
//! Every GPU call made by the command pool, the sync primitives, the state
//! cache and the frame orchestrator goes through [`GpuBackend`]. Components
//! receive an `Arc<dyn GpuBackend>` at construction instead of reaching for
//! a global device, which also lets tests substitute
//! [`MockBackend`](crate::mock::MockBackend).
//!
//! [`VulkanDevice`](crate::device::VulkanDevice) is the production
//! implementation.
//!
//! Methods prefixed with `cmd_` record into a command buffer that is in the
//! recording state; the caller is responsible for that, as with raw Vulkan.

use ash::vk;

use crate::error::RhiResult;
use crate::pipeline::{ComputePipelineDesc, GraphicsPipelineDesc};
use crate::rendering::{FramebufferDesc, RenderPassBegin, RenderPassDesc};

/// Queue a command pool allocates for and a submission targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Compute,
}

impl QueueKind {
    pub fn name(self) -> &'static str {
        match self {
            QueueKind::Graphics => "graphics",
            QueueKind::Compute => "compute",
        }
    }
}

/// One `vkQueueSubmit` batch.
///
/// `wait_semaphores` and `wait_stages` are parallel arrays.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubmitBatch<'a> {
    pub command_buffers: &'a [vk::CommandBuffer],
    pub wait_semaphores: &'a [vk::Semaphore],
    pub wait_stages: &'a [vk::PipelineStageFlags],
    pub signal_semaphores: &'a [vk::Semaphore],
}

impl<'a> SubmitBatch<'a> {
    /// Batch with no semaphores.
    pub fn unsynchronized(command_buffers: &'a [vk::CommandBuffer]) -> Self {
        Self {
            command_buffers,
            ..Default::default()
        }
    }
}

/// Logical device operations needed by the frame execution core.
pub trait GpuBackend: Send + Sync {
    // Command pools and buffers

    fn create_command_pool(&self, queue: QueueKind) -> RhiResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocates one primary command buffer.
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer>;
    /// Returns a command buffer to the initial state without releasing it.
    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()>;
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    /// Begins one-time-submit recording.
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()>;
    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()>;

    // Synchronization

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Blocks until `fence` signals or `timeout_ns` elapses.
    ///
    /// A timeout is reported as `RhiError::Vulkan(vk::Result::TIMEOUT)`.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> RhiResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()>;
    fn create_semaphore(&self) -> RhiResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // Queues and presentation

    /// Submits one batch; `fence` may be null.
    fn submit(
        &self,
        queue: QueueKind,
        batch: &SubmitBatch<'_>,
        fence: vk::Fence,
    ) -> RhiResult<()>;
    /// Returns the acquired image index and whether the swapchain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> RhiResult<(u32, bool)>;
    /// Queues a present; returns true if the swapchain should be recreated.
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool>;
    fn queue_wait_idle(&self, queue: QueueKind) -> RhiResult<()>;
    fn wait_idle(&self) -> RhiResult<()>;

    // Cached objects

    /// Layout over `set_layouts` in set order, no push constants.
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RhiResult<vk::Pipeline>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> RhiResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // Recording

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);
    fn cmd_bind_pipeline(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );
    fn cmd_bind_descriptor_set(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    );
    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport);
    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D);
    fn cmd_bind_vertex_buffer(
        &self,
        buffer: vk::CommandBuffer,
        vertex_buffer: vk::Buffer,
        offset: vk::DeviceSize,
    );
    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );
    fn cmd_draw(
        &self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_draw_indexed(
        &self,
        buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn cmd_dispatch(&self, buffer: vk::CommandBuffer, x: u32, y: u32, z: u32);
    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
}
