//! Pipeline/state cache tests against the mock backend.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use glam::Vec4;
use rstest::{fixture, rstest};

use vkframe_renderer::{EngineError, MAX_RENDER_TARGETS, PipelineStateCache};
use vkframe_rhi::descriptor::DescriptorBinding;
use vkframe_rhi::image::ImageView;
use vkframe_rhi::mock::{MockBackend, RecordedCommand};
use vkframe_rhi::pipeline::{
    BlendEquation, BlendFactor, BlendOp, ColorBlendAttachment, CullMode, FrontFace, PolygonMode,
    PrimitiveTopology,
};
use vkframe_rhi::shader::{ShaderKey, ShaderModule, ShaderStage};
use vkframe_rhi::vertex::{VertexAttribute, VertexBinding, VertexInputRate, VertexLayout};

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 1920,
    height: 1080,
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
        vk::Format::R8G8B8A8_UNORM,
    )
}

fn binding(raw: u64) -> DescriptorBinding {
    DescriptorBinding::new(
        vk::DescriptorSetLayout::from_raw(raw),
        vk::DescriptorSet::from_raw(raw + 0x100),
    )
}

const VERTEX_A: u64 = 0xa1;
const FRAGMENT_B: u64 = 0xb2;
const TARGET_X: u64 = 0x71;

#[fixture]
fn mock() -> Arc<MockBackend> {
    Arc::new(MockBackend::new())
}

/// Vertex shader A + fragment shader B rendering into view X.
fn baseline(mock: &Arc<MockBackend>) -> PipelineStateCache {
    let mut cache = PipelineStateCache::new(mock.clone());
    cache.set_shader(module(VERTEX_A, ShaderStage::Vertex));
    cache.set_shader(module(FRAGMENT_B, ShaderStage::Fragment));
    cache.set_render_target(0, view(TARGET_X)).unwrap();
    cache
}

#[rstest]
fn test_identical_state_builds_once(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);

    let first = cache.get_pipeline(EXTENT).unwrap();
    let second = cache.get_pipeline(EXTENT).unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.stats().graphics_pipelines_built, 1);
    assert_eq!(mock.stats().render_passes_built, 1);
    assert_eq!(mock.stats().framebuffers_built, 1);
    assert_eq!(mock.stats().pipeline_layouts_built, 1);
}

#[rstest]
fn test_separately_built_identical_state_shares_pipeline(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    let first = cache.get_pipeline(EXTENT).unwrap();

    // Rebuild the same logical state from scratch.
    cache.clear_shaders();
    cache.reset_render_targets();
    cache
        .set_rt_blend_state(0, ColorBlendAttachment::default())
        .unwrap();
    cache.set_shader(module(FRAGMENT_B, ShaderStage::Fragment));
    cache.set_shader(module(VERTEX_A, ShaderStage::Vertex));
    cache.set_render_target(0, view(TARGET_X)).unwrap();

    assert_eq!(cache.get_pipeline(EXTENT).unwrap(), first);
    assert_eq!(mock.stats().graphics_pipelines_built, 1);
}

#[rstest]
#[case::topology(|c: &mut PipelineStateCache| c.set_topology(PrimitiveTopology::LineList))]
#[case::polygon_mode(|c: &mut PipelineStateCache| c.set_polygon_mode(PolygonMode::Line))]
#[case::cull_mode(|c: &mut PipelineStateCache| c.set_cull_mode(CullMode::None))]
#[case::front_face(|c: &mut PipelineStateCache| c.set_front_face(FrontFace::CounterClockwise))]
#[case::fragment_shader(|c: &mut PipelineStateCache| {
    c.set_shader(module(0xb3, ShaderStage::Fragment))
})]
#[case::vertex_shader(|c: &mut PipelineStateCache| c.set_shader(module(0xa2, ShaderStage::Vertex)))]
#[case::blend_state(|c: &mut PipelineStateCache| {
    c.set_rt_blend_state(0, ColorBlendAttachment::alpha_blend()).unwrap()
})]
#[case::blend_factor(|c: &mut PipelineStateCache| {
    let blend = ColorBlendAttachment {
        color: BlendEquation::new(BlendFactor::SrcAlpha, BlendFactor::One, BlendOp::Add),
        ..ColorBlendAttachment::alpha_blend()
    };
    c.set_rt_blend_state(0, blend).unwrap()
})]
#[case::render_target_view(|c: &mut PipelineStateCache| {
    c.set_render_target(0, view(0x72)).unwrap()
})]
#[case::extra_render_target(|c: &mut PipelineStateCache| {
    c.set_render_target(1, view(0x72)).unwrap()
})]
#[case::clear_presence(|c: &mut PipelineStateCache| c.set_rt_clear_value(0, None).unwrap())]
#[case::descriptor_layout(|c: &mut PipelineStateCache| c.bind_structured_buffer(binding(0x51)))]
#[case::vertex_layout(|c: &mut PipelineStateCache| {
    c.set_vertex_layout(VertexLayout {
        bindings: vec![VertexBinding {
            binding: 0,
            stride: 12,
            input_rate: VertexInputRate::Vertex,
        }],
        attributes: vec![VertexAttribute {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        }],
    })
})]
fn test_any_single_difference_builds_new_pipeline(
    mock: Arc<MockBackend>,
    #[case] change: fn(&mut PipelineStateCache),
) {
    let mut cache = baseline(&mock);
    let before = cache.get_pipeline(EXTENT).unwrap();

    change(&mut cache);
    let after = cache.get_pipeline(EXTENT).unwrap();

    assert_ne!(before, after);
    assert_eq!(mock.stats().graphics_pipelines_built, 2);
}

#[rstest]
fn test_clear_color_does_not_rebuild(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    let black = cache.render_pass_begin(EXTENT).unwrap();

    cache
        .set_rt_clear_value(0, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)))
        .unwrap();
    let recolored = cache.render_pass_begin(EXTENT).unwrap();

    assert_eq!(black.render_pass, recolored.render_pass);
    assert_eq!(black.framebuffer, recolored.framebuffer);
    assert_eq!(black.clear_colors, vec![[0.0; 4]]);
    assert_eq!(recolored.clear_colors, vec![[1.0, 0.0, 0.0, 1.0]]);
    assert_eq!(mock.stats().render_passes_built, 1);
}

#[rstest]
fn test_reset_render_targets_is_idempotent(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    for i in 1..MAX_RENDER_TARGETS {
        cache.set_render_target(i, view(0x80 + i as u64)).unwrap();
    }
    cache
        .set_rt_blend_state(3, ColorBlendAttachment::alpha_blend())
        .unwrap();

    cache.reset_render_targets();
    let once = cache.state().clone();
    cache.reset_render_targets();
    let twice = cache.state();

    for i in 0..MAX_RENDER_TARGETS {
        assert_eq!(once.render_target(i), None);
        assert_eq!(twice.render_target(i), None);
        assert_eq!(once.clear_value(i), twice.clear_value(i));
        assert_eq!(once.blend_state(i), twice.blend_state(i));
        assert!(!twice.blend_state(i).unwrap().blend_enable);
    }
    assert!(matches!(
        cache.get_render_state(EXTENT),
        Err(EngineError::NoRenderTargets)
    ));
}

#[rstest]
fn test_compute_only_builds_single_stage(mock: Arc<MockBackend>) {
    let mut cache = PipelineStateCache::new(mock.clone());
    cache.set_shader(module(0xc1, ShaderStage::Compute));

    cache.get_pipeline(EXTENT).unwrap();

    let builds = mock.pipeline_builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].stage_count, 1);
    assert_eq!(builds[0].bind_point, vk::PipelineBindPoint::COMPUTE);
    // Compute pipelines need no render pass.
    assert_eq!(mock.stats().render_passes_built, 0);
}

#[rstest]
fn test_compute_with_vertex_is_rejected(mock: Arc<MockBackend>) {
    let mut cache = PipelineStateCache::new(mock.clone());
    cache
        .set_shader_checked(module(0xc1, ShaderStage::Compute))
        .unwrap();

    assert!(matches!(
        cache.set_shader_checked(module(VERTEX_A, ShaderStage::Vertex)),
        Err(EngineError::IncompleteShaderSet(_))
    ));

    // The unchecked setter replaces the family, leaving an incomplete set.
    cache.set_shader(module(VERTEX_A, ShaderStage::Vertex));
    assert!(matches!(
        cache.get_pipeline(EXTENT),
        Err(EngineError::IncompleteShaderSet(_))
    ));
    assert!(mock.pipeline_builds().is_empty());
}

#[rstest]
fn test_no_shaders_is_rejected(mock: Arc<MockBackend>) {
    let mut cache = PipelineStateCache::new(mock.clone());
    cache.set_render_target(0, view(TARGET_X)).unwrap();
    assert!(matches!(
        cache.get_pipeline(EXTENT),
        Err(EngineError::IncompleteShaderSet(_))
    ));
}

#[rstest]
fn test_descriptor_sets_bind_at_their_indices(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.bind_structured_buffer(binding(0x10));
    cache.bind_descriptor(0, binding(0x20)).unwrap();
    cache.bind_descriptor(1, binding(0x30)).unwrap();
    let cmd = vk::CommandBuffer::from_raw(0x5eed);

    cache.commit_states(cmd, EXTENT).unwrap();

    let layouts = mock.pipeline_layout_builds();
    assert_eq!(layouts.len(), 1);
    assert_eq!(layouts[0].len(), 3);

    let bound: Vec<(u32, vk::DescriptorSet)> = mock
        .commands(cmd)
        .into_iter()
        .filter_map(|command| match command {
            RecordedCommand::BindDescriptorSet { set_index, set, .. } => Some((set_index, set)),
            _ => None,
        })
        .collect();
    assert_eq!(
        bound,
        vec![
            (0, binding(0x10).set),
            (1, binding(0x20).set),
            (2, binding(0x30).set),
        ]
    );
}

#[rstest]
fn test_uniform_without_structured_buffer_is_rejected(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.bind_descriptor(0, binding(0x20)).unwrap();
    assert!(matches!(
        cache.get_pipeline_layout(),
        Err(EngineError::DescriptorSetGap(0))
    ));
}

#[rstest]
fn test_layout_shared_across_render_targets(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.bind_structured_buffer(binding(0x10));
    cache.get_pipeline(EXTENT).unwrap();

    cache.set_render_target(0, view(0x99)).unwrap();
    cache.get_pipeline(EXTENT).unwrap();

    assert_eq!(mock.stats().graphics_pipelines_built, 2);
    assert_eq!(mock.stats().pipeline_layouts_built, 1);
    assert_eq!(cache.stats().layout_hits, 1);
}

#[rstest]
fn test_compute_commit_skips_viewport(mock: Arc<MockBackend>) {
    let mut cache = PipelineStateCache::new(mock.clone());
    cache.set_shader(module(0xc1, ShaderStage::Compute));
    let cmd = vk::CommandBuffer::from_raw(0x5eed);

    cache.commit_states(cmd, EXTENT).unwrap();

    let commands = mock.commands(cmd);
    assert_eq!(commands.len(), 1);
    assert!(matches!(
        commands[0],
        RecordedCommand::BindPipeline {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            ..
        }
    ));
}

#[rstest]
fn test_render_target_gap_is_rejected(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.set_render_target(2, view(0x73)).unwrap();
    assert!(matches!(
        cache.get_pipeline(EXTENT),
        Err(EngineError::RenderTargetGap(2))
    ));
}

#[rstest]
fn test_extent_change_builds_new_framebuffer(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.get_render_state(EXTENT).unwrap();
    cache
        .get_render_state(vk::Extent2D {
            width: 800,
            height: 600,
        })
        .unwrap();
    assert_eq!(mock.stats().framebuffers_built, 2);
}

#[rstest]
fn test_extent_change_reuses_pipeline(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    let full = cache.get_pipeline(EXTENT).unwrap();
    let resized = cache
        .get_pipeline(vk::Extent2D {
            width: 800,
            height: 600,
        })
        .unwrap();

    assert_eq!(resized, full);
    assert_eq!(mock.stats().graphics_pipelines_built, 1);
    assert_eq!(cache.stats().pipeline_hits, 1);
}

#[rstest]
fn test_clear_destroys_and_rebuilds(mock: Arc<MockBackend>) {
    let mut cache = baseline(&mock);
    cache.get_pipeline(EXTENT).unwrap();
    let key = cache.get_render_state(EXTENT).unwrap().key;

    assert!(cache.invalidate_render_state(key));
    assert_eq!(cache.render_state_count(), 0);

    cache.clear();
    assert_eq!(mock.stats().live_cached_objects, 0);
    assert_eq!(cache.pipeline_count(), 0);

    cache.get_pipeline(EXTENT).unwrap();
    assert_eq!(mock.stats().graphics_pipelines_built, 2);
}
