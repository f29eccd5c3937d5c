//! Vulkan implementation of [`GpuBackend`].
//!
//! Device selection, logical device creation and swapchain creation happen
//! before the frame core starts. [`VulkanDevice`] wraps the resulting
//! `ash::Device`, the swapchain extension loader and the queue family
//! indices, and translates every [`GpuBackend`] call into the matching
//! Vulkan command.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::backend::GpuBackend;
//! use vkframe_rhi::device::{QueueFamilies, VulkanDevice};
//!
//! # fn example(instance: &ash::Instance, device: ash::Device) {
//! let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);
//! let families = QueueFamilies {
//!     graphics: 0,
//!     present: 0,
//!     compute: None,
//! };
//! let backend: Arc<dyn GpuBackend> =
//!     Arc::new(VulkanDevice::new(device, swapchain_loader, families));
//! # }
//! ```

use std::sync::{Mutex, PoisonError};

use ash::vk;
use tracing::{debug, info};

use crate::backend::{GpuBackend, QueueKind, SubmitBatch};
use crate::error::{RhiError, RhiResult};
use crate::pipeline::{ComputePipelineDesc, DYNAMIC_STATES, GraphicsPipelineDesc};
use crate::rendering::{FramebufferDesc, RenderPassBegin, RenderPassDesc};

/// Queue family indices chosen during device selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    /// Dedicated compute family; compute work falls back to graphics if absent.
    pub compute: Option<u32>,
}

/// [`GpuBackend`] over a Vulkan logical device.
///
/// The logical device is borrowed for the life of this struct; it is not
/// destroyed on drop because its creator still owns the instance.
///
/// # Thread Safety
///
/// Queue submission and presentation are serialized through an internal
/// mutex, as Vulkan requires external synchronization of queue access.
pub struct VulkanDevice {
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    compute_queue: Option<vk::Queue>,
    queue_lock: Mutex<()>,
}

impl VulkanDevice {
    /// Wraps a logical device and retrieves queue 0 of each family.
    pub fn new(
        device: ash::Device,
        swapchain_loader: ash::khr::swapchain::Device,
        families: QueueFamilies,
    ) -> Self {
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let compute_queue = families
            .compute
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        info!(
            "Vulkan backend ready (graphics family {}, present family {}, compute family {:?})",
            families.graphics, families.present, families.compute
        );

        Self {
            device,
            swapchain_loader,
            families,
            graphics_queue,
            present_queue,
            compute_queue,
            queue_lock: Mutex::new(()),
        }
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn queue(&self, kind: QueueKind) -> vk::Queue {
        match kind {
            QueueKind::Graphics => self.graphics_queue,
            QueueKind::Compute => self.compute_queue.unwrap_or(self.graphics_queue),
        }
    }

    fn family(&self, kind: QueueKind) -> u32 {
        match kind {
            QueueKind::Graphics => self.families.graphics,
            QueueKind::Compute => self.families.compute.unwrap_or(self.families.graphics),
        }
    }
}

impl GpuBackend for VulkanDevice {
    fn create_command_pool(&self, queue: QueueKind) -> RhiResult<vk::CommandPool> {
        let family = self.family(queue);
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family);

        let pool = unsafe { self.device.create_command_pool(&create_info, None)? };
        info!("Command pool created for {} queue family {}", queue.name(), family);
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
        debug!("Command pool destroyed");
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RhiResult<vk::CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info)? };
        buffers.into_iter().next().ok_or_else(|| {
            RhiError::InvalidHandle("driver returned no command buffer".to_string())
        })
    }

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())?
        };
        Ok(())
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe { self.device.free_command_buffers(pool, buffers) };
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(buffer, &begin_info)? };
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        unsafe { self.device.end_command_buffer(buffer)? };
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.device.create_fence(&create_info, None)? };
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> RhiResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        unsafe { self.device.reset_fences(&[fence])? };
        Ok(())
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.device.create_semaphore(&create_info, None)? };
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn submit(
        &self,
        queue: QueueKind,
        batch: &SubmitBatch<'_>,
        fence: vk::Fence,
    ) -> RhiResult<()> {
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(batch.wait_semaphores)
            .wait_dst_stage_mask(batch.wait_stages)
            .command_buffers(batch.command_buffers)
            .signal_semaphores(batch.signal_semaphores);

        let _guard = self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe {
            self.device
                .queue_submit(self.queue(queue), &[submit_info], fence)?
        };
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> RhiResult<(u32, bool)> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        };
        match result {
            Ok(acquired) => Ok(acquired),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(RhiError::SwapchainOutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _guard = self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        };
        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn queue_wait_idle(&self, queue: QueueKind) -> RhiResult<()> {
        let _guard = self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe { self.device.queue_wait_idle(self.queue(queue))? };
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        let _guard = self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let layout = unsafe { self.device.create_pipeline_layout(&create_info, None)? };
        debug!("Created pipeline layout with {} set(s)", set_layouts.len());
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass> {
        let attachments: Vec<vk::AttachmentDescription> =
            desc.color_attachments.iter().map(|a| a.to_vk()).collect();
        let color_refs = desc.color_references();
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&desc.dependencies);

        let render_pass = unsafe { self.device.create_render_pass(&create_info, None)? };
        debug!(
            "Created render pass with {} color attachment(s)",
            attachments.len()
        );
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(desc.render_pass)
            .attachments(&desc.attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);

        let framebuffer = unsafe { self.device.create_framebuffer(&create_info, None)? };
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RhiResult<vk::Pipeline> {
        if !desc.stages_match() {
            return Err(RhiError::PipelineError(
                "graphics pipeline needs a vertex and a fragment module".to_string(),
            ));
        }
        if desc.color_blend.is_empty() {
            return Err(RhiError::PipelineError(
                "graphics pipeline needs at least one color attachment".to_string(),
            ));
        }

        let shader_stages = desc.stages().map(|module| module.stage_create_info());

        let vertex_bindings = desc.vertex_layout.vk_bindings();
        let vertex_attributes = desc.vertex_layout.vk_attributes();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(desc.topology.to_vk())
            .primitive_restart_enable(false);

        // Dynamic viewport and scissor
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(desc.polygon_mode.to_vk())
            .line_width(1.0)
            .cull_mode(desc.cull_mode.to_vk())
            .front_face(desc.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> =
            desc.color_blend.iter().map(|a| a.to_vk()).collect();
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| RhiError::PipelineError(format!("graphics pipeline: {e}")))?
        };
        debug!(
            "Created graphics pipeline ({} color attachment(s))",
            color_blend_attachments.len()
        );
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> RhiResult<vk::Pipeline> {
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(desc.shader.stage_create_info())
            .layout(desc.layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| RhiError::PipelineError(format!("compute pipeline: {e}")))?
        };
        debug!("Created compute pipeline");
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        let clear_values = begin.vk_clear_values();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.render_area())
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(buffer, &begin_info, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(buffer) };
    }

    fn cmd_bind_pipeline(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        unsafe { self.device.cmd_bind_pipeline(buffer, bind_point, pipeline) };
    }

    fn cmd_bind_descriptor_set(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(buffer, bind_point, layout, set_index, &[set], &[])
        };
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .cmd_set_viewport(buffer, 0, std::slice::from_ref(viewport))
        };
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .cmd_set_scissor(buffer, 0, std::slice::from_ref(scissor))
        };
    }

    fn cmd_bind_vertex_buffer(
        &self,
        buffer: vk::CommandBuffer,
        vertex_buffer: vk::Buffer,
        offset: vk::DeviceSize,
    ) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(buffer, 0, &[vertex_buffer], &[offset])
        };
    }

    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(buffer, index_buffer, offset, index_type)
        };
    }

    fn cmd_draw(
        &self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw(
                buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            )
        };
    }

    fn cmd_draw_indexed(
        &self,
        buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    fn cmd_dispatch(&self, buffer: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(buffer, x, y, z) };
    }

    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.device.cmd_copy_buffer(buffer, src, dst, regions) };
    }
}
