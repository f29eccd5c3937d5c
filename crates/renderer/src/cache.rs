//! Hash-keyed cache of pipelines, pipeline layouts, render passes and
//! framebuffers.
//!
//! The cache owns the [`PipelineState`] accumulator. Setters mutate it
//! without touching the GPU; the `get_*` methods derive a key from the
//! current state and either return the cached object or build it through
//! the [`GpuBackend`].
//!
//! # Overview
//!
//! | object | keyed by |
//! |---|---|
//! | pipeline layout | descriptor set layouts (order-independent) |
//! | render pass + framebuffer | render target views, clear presence, extent |
//! | pipeline | render state, shaders, layout, vertex layout, fixed function, blend |
//!
//! Entries are never evicted during normal operation. [`PipelineStateCache::clear`]
//! and the `invalidate_*` methods exist for hot reload and swapchain
//! recreation; the caller must make sure the GPU no longer uses the
//! objects being dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_renderer::cache::PipelineStateCache;
//! use vkframe_rhi::backend::GpuBackend;
//! use vkframe_rhi::image::ImageView;
//! use vkframe_rhi::shader::ShaderModule;
//! use vkframe_rhi::vk;
//!
//! # fn example(
//! #     backend: Arc<dyn GpuBackend>,
//! #     vertex: ShaderModule,
//! #     fragment: ShaderModule,
//! #     target: ImageView,
//! #     cmd: vk::CommandBuffer,
//! # ) -> vkframe_renderer::EngineResult<()> {
//! let mut cache = PipelineStateCache::new(backend);
//! let extent = vk::Extent2D { width: 1280, height: 720 };
//!
//! cache.set_shader(vertex);
//! cache.set_shader(fragment);
//! cache.reset_render_targets();
//! cache.set_render_target(0, target)?;
//!
//! // Builds on the first call, returns the cached pipeline afterwards.
//! cache.commit_states(cmd, extent)?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use glam::Vec4;
use tracing::{debug, info, trace};

use vkframe_rhi::backend::GpuBackend;
use vkframe_rhi::descriptor::{DescriptorBinding, MAX_UNIFORM_SLOTS};
use vkframe_rhi::image::ImageView;
use vkframe_rhi::pipeline::{
    ColorBlendAttachment, ComputePipelineDesc, CullMode, FrontFace, GraphicsPipelineDesc,
    PolygonMode, PrimitiveTopology,
};
use vkframe_rhi::rendering::{
    ColorAttachmentDesc, FramebufferDesc, RenderPassBegin, RenderPassDesc,
};
use vkframe_rhi::shader::ShaderModule;
use vkframe_rhi::vertex::VertexLayout;

use crate::error::{EngineError, EngineResult};
use crate::state::{PipelineState, ShaderSet, ShaderStages, check_target};

/// A cached render pass and the framebuffer bound to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    pub key: u64,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub attachment_count: usize,
}

/// A cached pipeline with the layout and bind point it was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedPipeline {
    pub key: u64,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub bind_point: vk::PipelineBindPoint,
}

/// Build and hit counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub pipeline_builds: u64,
    pub pipeline_hits: u64,
    pub layout_builds: u64,
    pub layout_hits: u64,
    pub render_state_builds: u64,
    pub render_state_hits: u64,
}

/// Pipeline state accumulator plus the object caches derived from it.
///
/// # Thread Safety
///
/// Single writer. The orchestrator thread sets state and triggers builds;
/// the returned handles are plain values and can be shared freely.
pub struct PipelineStateCache {
    backend: Arc<dyn GpuBackend>,
    state: PipelineState,
    pipelines: HashMap<u64, CachedPipeline>,
    layouts: HashMap<u64, vk::PipelineLayout>,
    render_states: HashMap<u64, RenderState>,
    stats: CacheStats,
}

impl PipelineStateCache {
    /// Creates an empty cache with a default accumulator.
    ///
    /// The default state has no shaders or render targets, the
    /// [`StandardVertex`](vkframe_rhi::vertex::StandardVertex) layout,
    /// triangle lists, fill mode, back-face culling and clockwise front
    /// faces.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        info!("Pipeline state cache created");
        Self {
            backend,
            state: PipelineState::default(),
            pipelines: HashMap::new(),
            layouts: HashMap::new(),
            render_states: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// The accumulated state.
    #[inline]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn render_state_count(&self) -> usize {
        self.render_states.len()
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Binds `module` at its stage. A compute module replaces a bound
    /// vertex/fragment pair and vice versa.
    pub fn set_shader(&mut self, module: ShaderModule) {
        self.state.shaders.bind(module);
    }

    /// Binds `module` at its stage without replacing the other family.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IncompleteShaderSet`] if `module` belongs to
    /// a different family than the bound shaders.
    pub fn set_shader_checked(&mut self, module: ShaderModule) -> EngineResult<()> {
        self.state.shaders.bind_checked(module)
    }

    /// Unbinds all shaders.
    pub fn clear_shaders(&mut self) {
        self.state.shaders = ShaderSet::Unbound;
    }

    pub fn set_vertex_layout(&mut self, layout: VertexLayout) {
        self.state.vertex_layout = layout;
    }

    pub fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.state.topology = topology;
    }

    pub fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.state.polygon_mode = mode;
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.cull_mode = mode;
    }

    pub fn set_front_face(&mut self, front_face: FrontFace) {
        self.state.front_face = front_face;
    }

    /// Sets the blend state of render target `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderTargetIndex`] if `index` is out of range.
    pub fn set_rt_blend_state(
        &mut self,
        index: usize,
        blend: ColorBlendAttachment,
    ) -> EngineResult<()> {
        check_target(index)?;
        self.state.blend_states[index] = blend;
        Ok(())
    }

    /// Binds `view` as render target `index` and gives it a transparent
    /// black clear value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderTargetIndex`] if `index` is out of range.
    pub fn set_render_target(&mut self, index: usize, view: ImageView) -> EngineResult<()> {
        check_target(index)?;
        self.state.render_targets[index] = Some(view);
        self.state.clear_values[index] = Some(Vec4::ZERO);
        Ok(())
    }

    /// Sets or removes the clear value of render target `index`.
    ///
    /// `None` loads the target with `DONT_CARE` instead of clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderTargetIndex`] if `index` is out of
    /// range, or [`EngineError::UnsetRenderTarget`] if no view is bound
    /// there.
    pub fn set_rt_clear_value(&mut self, index: usize, clear: Option<Vec4>) -> EngineResult<()> {
        check_target(index)?;
        if self.state.render_targets[index].is_none() {
            return Err(EngineError::UnsetRenderTarget(index));
        }
        self.state.clear_values[index] = clear;
        Ok(())
    }

    /// Unbinds all render targets, their clear values and their blending.
    pub fn reset_render_targets(&mut self) {
        self.state.reset_render_targets();
    }

    /// Binds the structured buffer descriptor set (set 0).
    pub fn bind_structured_buffer(&mut self, binding: DescriptorBinding) {
        self.state.structured_buffer = Some(binding);
    }

    /// Binds a uniform descriptor set to `slot` (set `slot + 1`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UniformSlot`] if `slot` is out of range.
    pub fn bind_descriptor(&mut self, slot: usize, binding: DescriptorBinding) -> EngineResult<()> {
        let uniform = self
            .state
            .uniforms
            .get_mut(slot)
            .ok_or(EngineError::UniformSlot(slot))?;
        *uniform = Some(binding);
        Ok(())
    }

    /// Unbinds the structured buffer and every uniform slot.
    pub fn unbind_descriptors(&mut self) {
        self.state.structured_buffer = None;
        self.state.uniforms = [None; MAX_UNIFORM_SLOTS];
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Returns the pipeline layout for the bound descriptor sets.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DescriptorSetGap`] for an invalid binding
    /// pattern, or the device error if creation fails.
    pub fn get_pipeline_layout(&mut self) -> EngineResult<vk::PipelineLayout> {
        let key = self.state.layout_key()?;
        if let Some(&layout) = self.layouts.get(&key) {
            self.stats.layout_hits += 1;
            return Ok(layout);
        }

        let set_layouts: Vec<vk::DescriptorSetLayout> = self
            .state
            .descriptor_sets()?
            .iter()
            .map(|(_, binding)| binding.layout)
            .collect();
        let layout = self.backend.create_pipeline_layout(&set_layouts)?;
        debug!(
            "Built pipeline layout {:#018x} with {} set(s)",
            key,
            set_layouts.len()
        );
        self.layouts.insert(key, layout);
        self.stats.layout_builds += 1;
        Ok(layout)
    }

    /// Returns the render pass and framebuffer for the bound render targets.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRenderTargets`] or
    /// [`EngineError::RenderTargetGap`] for an invalid target set, or the
    /// device error if creation fails.
    pub fn get_render_state(&mut self, extent: vk::Extent2D) -> EngineResult<RenderState> {
        let key = self.state.render_state_key(extent)?;
        if let Some(&render_state) = self.render_states.get(&key) {
            self.stats.render_state_hits += 1;
            return Ok(render_state);
        }

        let targets = self.state.bound_targets()?;
        let attachments: Vec<ColorAttachmentDesc> = targets
            .iter()
            .zip(&self.state.clear_values)
            .map(|(target, clear)| {
                ColorAttachmentDesc::presentable(target.format(), clear.is_some())
            })
            .collect();
        let render_pass = self
            .backend
            .create_render_pass(&RenderPassDesc::new(attachments))?;

        let framebuffer = match self.backend.create_framebuffer(&FramebufferDesc {
            render_pass,
            attachments: targets.iter().map(ImageView::handle).collect(),
            extent,
        }) {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                self.backend.destroy_render_pass(render_pass);
                return Err(e.into());
            }
        };

        let render_state = RenderState {
            key,
            render_pass,
            framebuffer,
            extent,
            attachment_count: targets.len(),
        };
        debug!(
            "Built render state {:#018x}: {} attachment(s), {}x{}",
            key,
            targets.len(),
            extent.width,
            extent.height
        );
        self.render_states.insert(key, render_state);
        self.stats.render_state_builds += 1;
        Ok(render_state)
    }

    /// Key the current state maps to, without building anything.
    pub fn current_pipeline_key(&self) -> EngineResult<u64> {
        self.state.pipeline_key()
    }

    fn resolve_pipeline(&mut self, extent: vk::Extent2D) -> EngineResult<CachedPipeline> {
        let stages = self.state.shaders.resolve()?;
        let key = self.state.pipeline_key()?;
        if let Some(&cached) = self.pipelines.get(&key) {
            self.stats.pipeline_hits += 1;
            return Ok(cached);
        }

        let layout = self.get_pipeline_layout()?;
        let pipeline = match stages {
            ShaderStages::Graphics { vertex, fragment } => {
                let render_state = self.get_render_state(extent)?;
                let color_blend =
                    self.state.blend_states[..render_state.attachment_count].to_vec();
                self.backend.create_graphics_pipeline(&GraphicsPipelineDesc {
                    vertex,
                    fragment,
                    vertex_layout: self.state.vertex_layout.clone(),
                    topology: self.state.topology,
                    polygon_mode: self.state.polygon_mode,
                    cull_mode: self.state.cull_mode,
                    front_face: self.state.front_face,
                    color_blend,
                    layout,
                    render_pass: render_state.render_pass,
                    subpass: 0,
                })?
            }
            ShaderStages::Compute(shader) => self
                .backend
                .create_compute_pipeline(&ComputePipelineDesc { shader, layout })?,
        };

        let cached = CachedPipeline {
            key,
            pipeline,
            layout,
            bind_point: stages.bind_point(),
        };
        debug!(
            "Built {} pipeline {:#018x} ({} stage(s))",
            if stages.stage_count() == 1 { "compute" } else { "graphics" },
            key,
            stages.stage_count()
        );
        self.pipelines.insert(key, cached);
        self.stats.pipeline_builds += 1;
        Ok(cached)
    }

    /// Returns the pipeline for the current state, building it (and its
    /// layout and render state) on first use.
    ///
    /// Graphics pipelines are built against the render state for `extent`;
    /// compute pipelines ignore render targets.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IncompleteShaderSet`] unless exactly one of
    /// {vertex + fragment, compute} is bound, any render-target or
    /// descriptor error from the lookups it depends on, or the device
    /// error if creation fails.
    pub fn get_pipeline(&mut self, extent: vk::Extent2D) -> EngineResult<vk::Pipeline> {
        Ok(self.resolve_pipeline(extent)?.pipeline)
    }

    /// Resolves the pipeline and binds it, its descriptor sets and, for
    /// graphics, a full-extent viewport and scissor into `cmd`.
    ///
    /// # Arguments
    ///
    /// * `cmd` - A command buffer in the recording state
    /// * `extent` - Current swapchain extent
    ///
    /// # Errors
    ///
    /// Same as [`PipelineStateCache::get_pipeline`].
    pub fn commit_states(
        &mut self,
        cmd: vk::CommandBuffer,
        extent: vk::Extent2D,
    ) -> EngineResult<CachedPipeline> {
        let cached = self.resolve_pipeline(extent)?;
        let backend = self.backend.as_ref();

        backend.cmd_bind_pipeline(cmd, cached.bind_point, cached.pipeline);
        for (index, binding) in self.state.descriptor_sets()? {
            backend.cmd_bind_descriptor_set(
                cmd,
                cached.bind_point,
                cached.layout,
                index,
                binding.set,
            );
        }

        if cached.bind_point == vk::PipelineBindPoint::GRAPHICS {
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            backend.cmd_set_viewport(cmd, &viewport);
            backend.cmd_set_scissor(cmd, &scissor);
        }

        trace!("Committed pipeline {:#018x}", cached.key);
        Ok(cached)
    }

    /// Begin parameters for the current render state, with one clear color
    /// per bound target.
    pub fn render_pass_begin(&mut self, extent: vk::Extent2D) -> EngineResult<RenderPassBegin> {
        let render_state = self.get_render_state(extent)?;
        Ok(RenderPassBegin {
            render_pass: render_state.render_pass,
            framebuffer: render_state.framebuffer,
            extent,
            clear_colors: self.state.clear_colors()?,
        })
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Destroys the pipeline cached under `key`. Returns whether it existed.
    pub fn invalidate_pipeline(&mut self, key: u64) -> bool {
        match self.pipelines.remove(&key) {
            Some(cached) => {
                self.backend.destroy_pipeline(cached.pipeline);
                debug!("Invalidated pipeline {:#018x}", key);
                true
            }
            None => false,
        }
    }

    /// Destroys the render pass and framebuffer cached under `key`.
    /// Returns whether they existed.
    pub fn invalidate_render_state(&mut self, key: u64) -> bool {
        match self.render_states.remove(&key) {
            Some(render_state) => {
                self.backend.destroy_framebuffer(render_state.framebuffer);
                self.backend.destroy_render_pass(render_state.render_pass);
                debug!("Invalidated render state {:#018x}", key);
                true
            }
            None => false,
        }
    }

    /// Destroys every cached object: pipelines, then layouts, then
    /// framebuffers and render passes. The accumulated state is kept.
    pub fn clear(&mut self) {
        let backend = Arc::clone(&self.backend);
        for (_, cached) in self.pipelines.drain() {
            backend.destroy_pipeline(cached.pipeline);
        }
        for (_, layout) in self.layouts.drain() {
            backend.destroy_pipeline_layout(layout);
        }
        for (_, render_state) in self.render_states.drain() {
            backend.destroy_framebuffer(render_state.framebuffer);
            backend.destroy_render_pass(render_state.render_pass);
        }
    }

    /// Destroys every cached object.
    ///
    /// The device must be idle. Safe to call more than once.
    pub fn clean_up(&mut self) {
        let destroyed = self.pipelines.len() + self.layouts.len() + self.render_states.len();
        self.clear();
        if destroyed > 0 {
            info!("Pipeline state cache destroyed {} object(s)", destroyed);
        }
    }
}

impl Drop for PipelineStateCache {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use vkframe_rhi::mock::MockBackend;
    use vkframe_rhi::shader::{ShaderKey, ShaderStage};

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn module(raw: u64, stage: ShaderStage) -> ShaderModule {
        ShaderModule::new(
            vk::ShaderModule::from_raw(raw),
            stage,
            ShaderKey::combine(raw as u16, 0),
        )
    }

    fn view(raw: u64) -> ImageView {
        ImageView::new(
            vk::ImageView::from_raw(raw),
            vk::Image::from_raw(raw),
            vk::Format::B8G8R8A8_SRGB,
        )
    }

    fn graphics_cache() -> (Arc<MockBackend>, PipelineStateCache) {
        let mock = Arc::new(MockBackend::new());
        let mut cache = PipelineStateCache::new(mock.clone());
        cache.set_shader(module(1, ShaderStage::Vertex));
        cache.set_shader(module(2, ShaderStage::Fragment));
        cache.set_render_target(0, view(10)).unwrap();
        (mock, cache)
    }

    #[test]
    fn test_pipeline_is_cached() {
        let (mock, mut cache) = graphics_cache();

        let first = cache.get_pipeline(EXTENT).unwrap();
        let second = cache.get_pipeline(EXTENT).unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.stats().graphics_pipelines_built, 1);
        assert_eq!(cache.stats().pipeline_builds, 1);
        assert_eq!(cache.stats().pipeline_hits, 1);
    }

    #[test]
    fn test_render_pass_clears_only_with_clear_value() {
        let (mock, mut cache) = graphics_cache();
        cache.set_render_target(1, view(11)).unwrap();
        cache.set_rt_clear_value(1, None).unwrap();

        cache.get_render_state(EXTENT).unwrap();

        let builds = mock.render_pass_builds();
        let desc = &builds[0];
        assert_eq!(desc.color_attachments.len(), 2);
        assert_eq!(desc.color_attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(
            desc.color_attachments[1].load_op,
            vk::AttachmentLoadOp::DONT_CARE
        );
        assert_eq!(mock.framebuffer_builds()[0].extent, EXTENT);
    }

    #[test]
    fn test_clear_value_on_unset_target_is_rejected() {
        let (_mock, mut cache) = graphics_cache();
        assert!(matches!(
            cache.set_rt_clear_value(3, Some(Vec4::ONE)),
            Err(EngineError::UnsetRenderTarget(3))
        ));
        assert!(matches!(
            cache.set_rt_clear_value(8, None),
            Err(EngineError::RenderTargetIndex(8))
        ));
    }

    #[test]
    fn test_commit_binds_pipeline_and_dynamic_state() {
        use vkframe_rhi::mock::RecordedCommand;

        let (mock, mut cache) = graphics_cache();
        let cmd = vk::CommandBuffer::from_raw(0xc0de);

        let cached = cache.commit_states(cmd, EXTENT).unwrap();

        assert_eq!(
            mock.commands(cmd),
            vec![
                RecordedCommand::BindPipeline {
                    bind_point: vk::PipelineBindPoint::GRAPHICS,
                    pipeline: cached.pipeline,
                },
                RecordedCommand::SetViewport {
                    width: 800.0,
                    height: 600.0,
                },
                RecordedCommand::SetScissor {
                    width: 800,
                    height: 600,
                },
            ]
        );
    }

    #[test]
    fn test_invalidate_pipeline_forces_rebuild() {
        let (mock, mut cache) = graphics_cache();
        cache.get_pipeline(EXTENT).unwrap();
        let key = cache.current_pipeline_key().unwrap();

        assert!(cache.invalidate_pipeline(key));
        assert!(!cache.invalidate_pipeline(key));
        cache.get_pipeline(EXTENT).unwrap();

        assert_eq!(mock.stats().graphics_pipelines_built, 2);
    }

    #[test]
    fn test_clean_up_destroys_everything() {
        let (mock, mut cache) = graphics_cache();
        cache.get_pipeline(EXTENT).unwrap();
        // layout + render pass + framebuffer + pipeline
        assert_eq!(mock.stats().live_cached_objects, 4);

        cache.clean_up();
        assert_eq!(mock.stats().live_cached_objects, 0);
        assert_eq!(cache.pipeline_count(), 0);

        cache.clean_up();
        assert_eq!(mock.stats().live_cached_objects, 0);
    }

    #[test]
    fn test_drop_cleans_up() {
        let (mock, mut cache) = graphics_cache();
        cache.get_pipeline(EXTENT).unwrap();
        drop(cache);
        assert_eq!(mock.stats().live_cached_objects, 0);
    }

    #[test]
    fn test_uniform_slot_out_of_range() {
        let (_mock, mut cache) = graphics_cache();
        let binding = DescriptorBinding::new(
            vk::DescriptorSetLayout::from_raw(1),
            vk::DescriptorSet::from_raw(2),
        );
        assert!(matches!(
            cache.bind_descriptor(MAX_UNIFORM_SLOTS, binding),
            Err(EngineError::UniformSlot(3))
        ));
    }

    #[test]
    fn test_cache_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PipelineStateCache>();
    }
}
