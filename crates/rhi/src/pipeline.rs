//! Pipeline descriptions.
//!
//! The types here describe *what* pipeline to build; building happens in a
//! [`GpuBackend`](crate::backend::GpuBackend). All fixed-function enums are
//! `Hash` so the state cache can fold them into pipeline keys.
//!
//! # Overview
//!
//! - [`GraphicsPipelineDesc`] - vertex + fragment stages, fixed-function state,
//!   one blend attachment per color target, render pass compatibility
//! - [`ComputePipelineDesc`] - a single compute stage
//! - [`ColorBlendAttachment`] - per-render-target blend state
//!
//! Viewport and scissor are always dynamic ([`DYNAMIC_STATES`]), so a
//! pipeline is independent of the output resolution.

use ash::vk;

use crate::shader::{ShaderModule, ShaderStage};
use crate::vertex::VertexLayout;

/// Dynamic state shared by every graphics pipeline.
pub const DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Declares a hashable enum mirroring a subset of a Vulkan enum, with
/// `to_vk` and `From` conversions.
macro_rules! vk_mirror {
    (
        $(#[$meta:meta])*
        $name:ident => $vk:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub fn to_vk(self) -> $vk {
                match self {
                    $( Self::$variant => $value ),+
                }
            }
        }

        impl From<$name> for $vk {
            fn from(value: $name) -> Self {
                value.to_vk()
            }
        }
    };
}

vk_mirror! {
    /// How vertices are assembled into primitives.
    #[derive(Default)]
    PrimitiveTopology => vk::PrimitiveTopology {
        PointList = vk::PrimitiveTopology::POINT_LIST,
        LineList = vk::PrimitiveTopology::LINE_LIST,
        LineStrip = vk::PrimitiveTopology::LINE_STRIP,
        #[default]
        TriangleList = vk::PrimitiveTopology::TRIANGLE_LIST,
        TriangleStrip = vk::PrimitiveTopology::TRIANGLE_STRIP,
        TriangleFan = vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

vk_mirror! {
    #[derive(Default)]
    PolygonMode => vk::PolygonMode {
        #[default]
        Fill = vk::PolygonMode::FILL,
        /// Wireframe.
        Line = vk::PolygonMode::LINE,
        Point = vk::PolygonMode::POINT,
    }
}

vk_mirror! {
    /// Face culling mode.
    #[derive(Default)]
    CullMode => vk::CullModeFlags {
        None = vk::CullModeFlags::NONE,
        #[default]
        Back = vk::CullModeFlags::BACK,
    }
}

vk_mirror! {
    /// Winding order of front-facing triangles.
    #[derive(Default)]
    FrontFace => vk::FrontFace {
        #[default]
        Clockwise = vk::FrontFace::CLOCKWISE,
        CounterClockwise = vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

vk_mirror! {
    BlendFactor => vk::BlendFactor {
        Zero = vk::BlendFactor::ZERO,
        One = vk::BlendFactor::ONE,
        SrcColor = vk::BlendFactor::SRC_COLOR,
        OneMinusSrcColor = vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        DstColor = vk::BlendFactor::DST_COLOR,
        OneMinusDstColor = vk::BlendFactor::ONE_MINUS_DST_COLOR,
        SrcAlpha = vk::BlendFactor::SRC_ALPHA,
        OneMinusSrcAlpha = vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        DstAlpha = vk::BlendFactor::DST_ALPHA,
        OneMinusDstAlpha = vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

vk_mirror! {
    #[derive(Default)]
    BlendOp => vk::BlendOp {
        #[default]
        Add = vk::BlendOp::ADD,
        Subtract = vk::BlendOp::SUBTRACT,
        ReverseSubtract = vk::BlendOp::REVERSE_SUBTRACT,
        Min = vk::BlendOp::MIN,
        Max = vk::BlendOp::MAX,
    }
}

/// `src * src_factor <op> dst * dst_factor` for one channel group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendEquation {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

impl BlendEquation {
    /// Writes the source through, ignoring the destination.
    pub const REPLACE: Self = Self::new(BlendFactor::One, BlendFactor::Zero, BlendOp::Add);

    pub const fn new(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> Self {
        Self { src, dst, op }
    }
}

impl Default for BlendEquation {
    fn default() -> Self {
        Self::REPLACE
    }
}

/// Blend state of one render target.
///
/// When `blend_enable` is false the equations are kept but ignored, so a
/// target can be toggled without re-specifying them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub color: BlendEquation,
    pub alpha: BlendEquation,
}

impl ColorBlendAttachment {
    /// `src * src_alpha + dst * (1 - src_alpha)`, alpha written through.
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            color: BlendEquation::new(
                BlendFactor::SrcAlpha,
                BlendFactor::OneMinusSrcAlpha,
                BlendOp::Add,
            ),
            alpha: BlendEquation::REPLACE,
        }
    }

    /// Same equations with blending switched off.
    pub fn disabled(self) -> Self {
        Self {
            blend_enable: false,
            ..self
        }
    }

    /// Converts to Vulkan state. Disabled attachments emit replace
    /// equations and write all channels.
    pub fn to_vk(&self) -> vk::PipelineColorBlendAttachmentState {
        let (color, alpha) = if self.blend_enable {
            (self.color, self.alpha)
        } else {
            (BlendEquation::REPLACE, BlendEquation::REPLACE)
        };
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(self.blend_enable)
            .src_color_blend_factor(color.src.into())
            .dst_color_blend_factor(color.dst.into())
            .color_blend_op(color.op.into())
            .src_alpha_blend_factor(alpha.src.into())
            .dst_alpha_blend_factor(alpha.dst.into())
            .alpha_blend_op(alpha.op.into())
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }
}

/// Everything needed to build a graphics pipeline against a render pass.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    pub vertex: ShaderModule,
    pub fragment: ShaderModule,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// One entry per color attachment of `render_pass`.
    pub color_blend: Vec<ColorBlendAttachment>,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl GraphicsPipelineDesc {
    /// Shader stages in pipeline order.
    pub fn stages(&self) -> [ShaderModule; 2] {
        [self.vertex, self.fragment]
    }

    pub fn stage_count(&self) -> u32 {
        2
    }

    /// Checks that each stage module was compiled for the slot it occupies.
    pub fn stages_match(&self) -> bool {
        self.vertex.stage() == ShaderStage::Vertex && self.fragment.stage() == ShaderStage::Fragment
    }
}

/// A compute pipeline: one compute stage and a layout.
#[derive(Clone, Copy, Debug)]
pub struct ComputePipelineDesc {
    pub shader: ShaderModule,
    pub layout: vk::PipelineLayout,
}

impl ComputePipelineDesc {
    pub fn stage_count(&self) -> u32 {
        1
    }
}
