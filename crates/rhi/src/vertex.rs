//! Vertex input layouts.
//!
//! Pipelines take their vertex input state from a [`VertexLayout`], which is
//! hashable so it can take part in pipeline cache keys. [`StandardVertex`] is
//! the default layout used when the caller does not set one.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// One vertex buffer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Whether a binding advances per vertex or per instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    #[default]
    Vertex,
    Instance,
}

/// One shader input attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: vk::Format,
    pub offset: u32,
}

/// Complete vertex input description for a graphics pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexInputRate {
    pub fn to_vk(self) -> vk::VertexInputRate {
        match self {
            VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
            VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
        }
    }
}

impl VertexLayout {
    /// A layout with no vertex inputs, for shaders that generate vertices.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Vulkan binding descriptions.
    pub fn vk_bindings(&self) -> Vec<vk::VertexInputBindingDescription> {
        self.bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: b.input_rate.to_vk(),
            })
            .collect()
    }

    /// Vulkan attribute descriptions.
    pub fn vk_attributes(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: a.format,
                offset: a.offset,
            })
            .collect()
    }
}

/// Default vertex format: 2D position and RGB color.
///
/// - location 0: position (vec2, offset 0)
/// - location 1: color (vec3, offset 8)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StandardVertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl StandardVertex {
    #[inline]
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Layout matching this struct at binding 0.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: size_of::<Self>() as u32,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: offset_of!(StandardVertex, position) as u32,
                },
                VertexAttribute {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: offset_of!(StandardVertex, color) as u32,
                },
            ],
        }
    }
}
