//! Pipeline state accumulator.
//!
//! [`PipelineState`] collects everything a draw depends on: shaders,
//! vertex layout, fixed-function settings, render targets with their
//! blend and clear state, and descriptor bindings. Callers mutate it
//! through the [`PipelineStateCache`](crate::cache::PipelineStateCache)
//! setters; nothing here touches the GPU.
//!
//! The key derivation methods fold the accumulated state into the
//! 64-bit keys the cache is indexed by.

use std::hash::Hasher;

use ash::vk;
use glam::Vec4;
use tracing::trace;

use vkframe_rhi::descriptor::{
    DescriptorBinding, MAX_UNIFORM_SLOTS, STRUCTURED_BUFFER_SET, uniform_set_index,
};
use vkframe_rhi::image::ImageView;
use vkframe_rhi::pipeline::{
    ColorBlendAttachment, CullMode, FrontFace, PolygonMode, PrimitiveTopology,
};
use vkframe_rhi::shader::{ShaderModule, ShaderStage};
use vkframe_rhi::vertex::{StandardVertex, VertexLayout};

use crate::error::{EngineError, EngineResult};
use crate::hash::{StateHasher, combine_unordered};

/// Number of render target slots.
pub const MAX_RENDER_TARGETS: usize = 8;

/// Shaders bound to the accumulator.
///
/// Graphics and compute modules are mutually exclusive by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderSet {
    #[default]
    Unbound,
    /// Vertex + fragment, possibly still partial.
    Graphics {
        vertex: Option<ShaderModule>,
        fragment: Option<ShaderModule>,
    },
    Compute(ShaderModule),
}

/// A complete shader set, ready for pipeline creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStages {
    Graphics {
        vertex: ShaderModule,
        fragment: ShaderModule,
    },
    Compute(ShaderModule),
}

impl ShaderStages {
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match self {
            Self::Graphics { .. } => vk::PipelineBindPoint::GRAPHICS,
            Self::Compute(_) => vk::PipelineBindPoint::COMPUTE,
        }
    }

    pub fn stage_count(&self) -> u32 {
        match self {
            Self::Graphics { .. } => 2,
            Self::Compute(_) => 1,
        }
    }
}

impl ShaderSet {
    /// Binds `module` at its stage, replacing a binding of the other family.
    pub fn bind(&mut self, module: ShaderModule) {
        *self = match (module.stage(), *self) {
            (ShaderStage::Compute, _) => Self::Compute(module),
            (ShaderStage::Vertex, Self::Graphics { fragment, .. }) => Self::Graphics {
                vertex: Some(module),
                fragment,
            },
            (ShaderStage::Vertex, _) => Self::Graphics {
                vertex: Some(module),
                fragment: None,
            },
            (ShaderStage::Fragment, Self::Graphics { vertex, .. }) => Self::Graphics {
                vertex,
                fragment: Some(module),
            },
            (ShaderStage::Fragment, _) => Self::Graphics {
                vertex: None,
                fragment: Some(module),
            },
        };
    }

    /// Binds `module`, refusing to replace a binding of the other family.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IncompleteShaderSet`] when mixing compute with
    /// vertex/fragment modules.
    pub fn bind_checked(&mut self, module: ShaderModule) -> EngineResult<()> {
        match (module.stage(), self) {
            (ShaderStage::Compute, Self::Graphics { .. }) => Err(EngineError::IncompleteShaderSet(
                "a compute shader cannot join a graphics shader set",
            )),
            (ShaderStage::Vertex | ShaderStage::Fragment, Self::Compute(_)) => {
                Err(EngineError::IncompleteShaderSet(
                    "a graphics shader cannot join a compute shader set",
                ))
            }
            (_, set) => {
                set.bind(module);
                Ok(())
            }
        }
    }

    /// Returns the complete stage set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IncompleteShaderSet`] when nothing is bound or
    /// a graphics set lacks a stage.
    pub fn resolve(&self) -> EngineResult<ShaderStages> {
        match *self {
            Self::Unbound => Err(EngineError::IncompleteShaderSet("no shaders are bound")),
            Self::Graphics {
                vertex: Some(vertex),
                fragment: Some(fragment),
            } => Ok(ShaderStages::Graphics { vertex, fragment }),
            Self::Graphics { vertex: None, .. } => Err(EngineError::IncompleteShaderSet(
                "graphics set is missing a vertex shader",
            )),
            Self::Graphics { fragment: None, .. } => Err(EngineError::IncompleteShaderSet(
                "graphics set is missing a fragment shader",
            )),
            Self::Compute(module) => Ok(ShaderStages::Compute(module)),
        }
    }
}

/// Everything a pipeline, its layout and its render pass are derived from.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub(crate) shaders: ShaderSet,
    pub(crate) vertex_layout: VertexLayout,
    pub(crate) topology: PrimitiveTopology,
    pub(crate) polygon_mode: PolygonMode,
    pub(crate) cull_mode: CullMode,
    pub(crate) front_face: FrontFace,
    pub(crate) render_targets: [Option<ImageView>; MAX_RENDER_TARGETS],
    pub(crate) clear_values: [Option<Vec4>; MAX_RENDER_TARGETS],
    pub(crate) blend_states: [ColorBlendAttachment; MAX_RENDER_TARGETS],
    pub(crate) structured_buffer: Option<DescriptorBinding>,
    pub(crate) uniforms: [Option<DescriptorBinding>; MAX_UNIFORM_SLOTS],
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            shaders: ShaderSet::Unbound,
            vertex_layout: StandardVertex::layout(),
            topology: PrimitiveTopology::default(),
            polygon_mode: PolygonMode::default(),
            cull_mode: CullMode::Back,
            front_face: FrontFace::default(),
            render_targets: [None; MAX_RENDER_TARGETS],
            clear_values: [None; MAX_RENDER_TARGETS],
            blend_states: [ColorBlendAttachment::default(); MAX_RENDER_TARGETS],
            structured_buffer: None,
            uniforms: [None; MAX_UNIFORM_SLOTS],
        }
    }
}

pub(crate) fn check_target(index: usize) -> EngineResult<()> {
    if index >= MAX_RENDER_TARGETS {
        return Err(EngineError::RenderTargetIndex(index));
    }
    Ok(())
}

impl PipelineState {
    pub fn shaders(&self) -> ShaderSet {
        self.shaders
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    pub fn front_face(&self) -> FrontFace {
        self.front_face
    }

    /// Binding of the structured-buffer set, if one is bound.
    pub fn structured_buffer(&self) -> Option<DescriptorBinding> {
        self.structured_buffer
    }

    pub fn render_target(&self, index: usize) -> Option<ImageView> {
        self.render_targets.get(index).copied().flatten()
    }

    pub fn clear_value(&self, index: usize) -> Option<Vec4> {
        self.clear_values.get(index).copied().flatten()
    }

    pub fn blend_state(&self, index: usize) -> Option<ColorBlendAttachment> {
        self.blend_states.get(index).copied()
    }

    /// Unbinds every render target, its clear value and its blending.
    /// Blend factors are kept so re-enabling restores them.
    pub fn reset_render_targets(&mut self) {
        self.render_targets = [None; MAX_RENDER_TARGETS];
        self.clear_values = [None; MAX_RENDER_TARGETS];
        for blend in &mut self.blend_states {
            *blend = blend.disabled();
        }
    }

    /// Number of render targets bound from slot 0 onward.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderTargetGap`] if a target is bound after
    /// an unset slot.
    pub fn render_target_count(&self) -> EngineResult<usize> {
        let count = self
            .render_targets
            .iter()
            .position(Option::is_none)
            .unwrap_or(MAX_RENDER_TARGETS);
        if let Some(stray) = self.render_targets[count..]
            .iter()
            .position(Option::is_some)
        {
            return Err(EngineError::RenderTargetGap(count + stray));
        }
        Ok(count)
    }

    /// Views of the bound render targets, in slot order.
    pub fn bound_targets(&self) -> EngineResult<Vec<ImageView>> {
        let count = self.render_target_count()?;
        Ok(self.render_targets[..count].iter().flatten().copied().collect())
    }

    /// Clear colors for the bound targets. Targets without a clear value
    /// get zeros, which the render pass ignores.
    pub fn clear_colors(&self) -> EngineResult<Vec<[f32; 4]>> {
        let count = self.render_target_count()?;
        Ok(self.clear_values[..count]
            .iter()
            .map(|clear| clear.unwrap_or(Vec4::ZERO).to_array())
            .collect())
    }

    /// Descriptor sets in set order.
    ///
    /// The structured buffer occupies set 0 and uniform slot `i` set
    /// `i + 1`. Uniform slots stop at the first unset one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DescriptorSetGap`] if a uniform is bound
    /// without the structured buffer.
    pub fn descriptor_sets(&self) -> EngineResult<Vec<(u32, DescriptorBinding)>> {
        let Some(structured) = self.structured_buffer else {
            if self.uniforms.iter().any(Option::is_some) {
                return Err(EngineError::DescriptorSetGap(STRUCTURED_BUFFER_SET));
            }
            return Ok(Vec::new());
        };

        let mut sets = vec![(STRUCTURED_BUFFER_SET, structured)];
        for (slot, uniform) in self.uniforms.iter().enumerate() {
            match uniform {
                Some(binding) => sets.push((uniform_set_index(slot), *binding)),
                None => {
                    if self.uniforms[slot..].iter().any(Option::is_some) {
                        trace!("Uniform slot {} is unset; later slots are not bound", slot);
                    }
                    break;
                }
            }
        }
        Ok(sets)
    }

    /// Key of the pipeline layout: the set of (set index, layout) pairs.
    pub fn layout_key(&self) -> EngineResult<u64> {
        let sets = self.descriptor_sets()?;
        Ok(combine_unordered(sets.iter().map(|(index, binding)| {
            let mut hasher = StateHasher::new();
            hasher.add(index).add(&binding.layout_identity());
            hasher.finish()
        })))
    }

    /// Key of the bound render-target set.
    ///
    /// Covers each bound target's view identity and whether it clears, in
    /// slot order. Clear colors are not part of the key.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRenderTargets`] if slot 0 is unset, or
    /// [`EngineError::RenderTargetGap`].
    pub fn render_targets_key(&self) -> EngineResult<u64> {
        let count = self.render_target_count()?;
        if count == 0 {
            return Err(EngineError::NoRenderTargets);
        }
        let mut hasher = StateHasher::new();
        for (target, clear) in self.render_targets[..count]
            .iter()
            .flatten()
            .zip(&self.clear_values)
        {
            hasher.add(&target.identity()).add(&clear.is_some());
        }
        Ok(hasher.finish())
    }

    /// Key of the render pass and framebuffer: the render-target key
    /// chained with `extent`.
    ///
    /// # Errors
    ///
    /// See [`PipelineState::render_targets_key`].
    pub fn render_state_key(&self, extent: vk::Extent2D) -> EngineResult<u64> {
        let mut hasher = StateHasher::chained(self.render_targets_key()?);
        hasher.add(&extent.width).add(&extent.height);
        Ok(hasher.finish())
    }

    /// Key of the pipeline.
    ///
    /// Graphics keys chain the render-target key with both shader
    /// identities, the layout key, the vertex layout, the fixed-function
    /// settings and the blend state of every bound target. Compute keys
    /// cover only the shader and the layout. The extent is never part of
    /// the key: viewport and scissor are dynamic.
    pub fn pipeline_key(&self) -> EngineResult<u64> {
        let stages = self.shaders.resolve()?;
        let layout_key = self.layout_key()?;
        let mut hasher = match stages {
            ShaderStages::Graphics { vertex, fragment } => {
                let count = self.render_target_count()?;
                let mut hasher = StateHasher::chained(self.render_targets_key()?);
                hasher
                    .add(&vertex.identity())
                    .add(&fragment.identity())
                    .add(&self.vertex_layout)
                    .add(&self.topology)
                    .add(&self.polygon_mode)
                    .add(&self.cull_mode)
                    .add(&self.front_face)
                    .add(&self.blend_states[..count]);
                hasher
            }
            ShaderStages::Compute(compute) => {
                let mut hasher = StateHasher::new();
                hasher
                    .add(&vk::PipelineBindPoint::COMPUTE.as_raw())
                    .add(&compute.identity());
                hasher
            }
        };
        hasher.add(&layout_key);
        Ok(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use vkframe_rhi::shader::ShaderKey;

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

    fn binding(raw: u64) -> DescriptorBinding {
        DescriptorBinding::new(
            vk::DescriptorSetLayout::from_raw(raw),
            vk::DescriptorSet::from_raw(raw + 100),
        )
    }

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_bind_builds_graphics_set() {
        let mut set = ShaderSet::default();
        set.bind(module(1, ShaderStage::Vertex));
        assert!(set.resolve().is_err());
        set.bind(module(2, ShaderStage::Fragment));
        let stages = set.resolve().unwrap();
        assert_eq!(stages.stage_count(), 2);
        assert_eq!(stages.bind_point(), vk::PipelineBindPoint::GRAPHICS);
    }

    #[test]
    fn test_compute_replaces_graphics() {
        let mut set = ShaderSet::default();
        set.bind(module(1, ShaderStage::Vertex));
        set.bind(module(2, ShaderStage::Fragment));
        set.bind(module(3, ShaderStage::Compute));
        assert_eq!(set.resolve().unwrap().stage_count(), 1);
    }

    #[test]
    fn test_bind_checked_rejects_mixing() {
        let mut set = ShaderSet::default();
        set.bind_checked(module(3, ShaderStage::Compute)).unwrap();
        assert!(matches!(
            set.bind_checked(module(1, ShaderStage::Vertex)),
            Err(EngineError::IncompleteShaderSet(_))
        ));
        // The compute binding survives the rejected call.
        assert!(matches!(set, ShaderSet::Compute(_)));
    }

    #[test]
    fn test_unbound_does_not_resolve() {
        assert!(matches!(
            ShaderSet::Unbound.resolve(),
            Err(EngineError::IncompleteShaderSet(_))
        ));
    }

    #[test]
    fn test_render_target_gap_is_rejected() {
        let mut state = PipelineState::default();
        state.render_targets[0] = Some(view(1));
        state.render_targets[2] = Some(view(2));
        assert!(matches!(
            state.render_target_count(),
            Err(EngineError::RenderTargetGap(2))
        ));
    }

    #[test]
    fn test_render_state_key_requires_targets() {
        let state = PipelineState::default();
        assert!(matches!(
            state.render_state_key(EXTENT),
            Err(EngineError::NoRenderTargets)
        ));
    }

    #[test]
    fn test_render_state_key_is_positional() {
        let mut a = PipelineState::default();
        a.render_targets[0] = Some(view(1));
        a.render_targets[1] = Some(view(2));
        let mut b = PipelineState::default();
        b.render_targets[0] = Some(view(2));
        b.render_targets[1] = Some(view(1));
        assert_ne!(
            a.render_state_key(EXTENT).unwrap(),
            b.render_state_key(EXTENT).unwrap()
        );
    }

    #[test]
    fn test_clear_presence_changes_key_but_color_does_not() {
        let mut state = PipelineState::default();
        state.render_targets[0] = Some(view(1));
        state.clear_values[0] = Some(Vec4::ZERO);
        let clearing = state.render_state_key(EXTENT).unwrap();

        state.clear_values[0] = Some(Vec4::ONE);
        assert_eq!(state.render_state_key(EXTENT).unwrap(), clearing);

        state.clear_values[0] = None;
        assert_ne!(state.render_state_key(EXTENT).unwrap(), clearing);
    }

    #[test]
    fn test_layout_key_ignores_unrelated_state() {
        let mut state = PipelineState::default();
        state.structured_buffer = Some(binding(1));
        state.uniforms[0] = Some(binding(2));
        let key = state.layout_key().unwrap();

        state.render_targets[0] = Some(view(9));
        state.topology = PrimitiveTopology::LineList;
        assert_eq!(state.layout_key().unwrap(), key);
    }

    #[test]
    fn test_uniform_without_structured_buffer_is_gap() {
        let mut state = PipelineState::default();
        state.uniforms[0] = Some(binding(2));
        assert!(matches!(
            state.descriptor_sets(),
            Err(EngineError::DescriptorSetGap(0))
        ));
    }

    #[test]
    fn test_uniforms_stop_at_first_unset_slot() {
        let mut state = PipelineState::default();
        state.structured_buffer = Some(binding(1));
        state.uniforms[0] = Some(binding(2));
        state.uniforms[2] = Some(binding(4));
        let sets: Vec<u32> = state
            .descriptor_sets()
            .unwrap()
            .iter()
            .map(|(index, _)| *index)
            .collect();
        assert_eq!(sets, vec![0, 1]);
    }

    #[test]
    fn test_reset_render_targets_keeps_blend_factors() {
        let mut state = PipelineState::default();
        state.render_targets[0] = Some(view(1));
        state.clear_values[0] = Some(Vec4::ONE);
        state.blend_states[0] = ColorBlendAttachment::alpha_blend();

        state.reset_render_targets();

        assert!(state.render_target(0).is_none());
        assert!(state.clear_value(0).is_none());
        let blend = state.blend_state(0).unwrap();
        assert!(!blend.blend_enable);
        assert_eq!(blend, ColorBlendAttachment::alpha_blend().disabled());
    }

    #[test]
    fn test_clear_colors_fill_unset_with_zero() {
        let mut state = PipelineState::default();
        state.render_targets[0] = Some(view(1));
        state.render_targets[1] = Some(view(2));
        state.clear_values[0] = Some(Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(
            state.clear_colors().unwrap(),
            vec![[0.1, 0.2, 0.3, 1.0], [0.0; 4]]
        );
    }

    #[test]
    fn test_compute_key_ignores_render_targets() {
        let mut state = PipelineState::default();
        state.shaders.bind(module(7, ShaderStage::Compute));
        let key = state.pipeline_key().unwrap();
        state.render_targets[0] = Some(view(1));
        assert_eq!(state.pipeline_key().unwrap(), key);
    }

    #[test]
    fn test_extent_only_changes_render_state_key() {
        let mut state = PipelineState::default();
        state.shaders.bind(module(1, ShaderStage::Vertex));
        state.shaders.bind(module(2, ShaderStage::Fragment));
        state.render_targets[0] = Some(view(1));
        let small = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let pipeline = state.pipeline_key().unwrap();
        assert_ne!(
            state.render_state_key(EXTENT).unwrap(),
            state.render_state_key(small).unwrap()
        );

        // An equal view keeps the key.
        state.render_targets[0] = Some(view(1));
        assert_eq!(state.pipeline_key().unwrap(), pipeline);

        state.render_targets[0] = Some(view(2));
        assert_ne!(state.pipeline_key().unwrap(), pipeline);
    }
}
