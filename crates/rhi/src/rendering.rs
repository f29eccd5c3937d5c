//! Render pass and framebuffer descriptions.
//!
//! These describe the classic `VkRenderPass` + `VkFramebuffer` pair used by
//! the frame core:
//!
//! - [`ColorAttachmentDesc`] - format and load/store behaviour of one target
//! - [`RenderPassDesc`] - one subpass writing every color attachment, plus the
//!   external dependency that orders it after swapchain image acquisition
//! - [`FramebufferDesc`] - concrete image views bound to a render pass
//! - [`RenderPassBegin`] - per-frame begin parameters including clear colors
//!
//! # Example
//!
//! ```
//! use vkframe_rhi::rendering::{ColorAttachmentDesc, RenderPassDesc};
//! use vkframe_rhi::vk;
//!
//! let desc = RenderPassDesc::new(vec![
//!     ColorAttachmentDesc::presentable(vk::Format::B8G8R8A8_SRGB, true),
//! ]);
//! assert_eq!(desc.color_attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
//! assert_eq!(desc.dependencies.len(), 1);
//! ```

use ash::vk;

/// One color attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorAttachmentDesc {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl ColorAttachmentDesc {
    /// Attachment that is cleared (or left undefined) on load, always stored,
    /// and ends the pass ready for presentation.
    pub fn presentable(format: vk::Format, clear: bool) -> Self {
        Self {
            format,
            load_op: if clear {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::DONT_CARE
            },
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    /// Converts to a Vulkan attachment description (single sample, no stencil).
    pub fn to_vk(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription::default()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(self.initial_layout)
            .final_layout(self.final_layout)
    }
}

/// Single-subpass render pass description.
#[derive(Clone, Debug)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<ColorAttachmentDesc>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

impl RenderPassDesc {
    /// Creates a description with the acquire-ordering dependency installed.
    pub fn new(color_attachments: Vec<ColorAttachmentDesc>) -> Self {
        Self {
            color_attachments,
            dependencies: vec![Self::acquire_dependency()],
        }
    }

    /// External -> subpass 0 dependency at the color-attachment-output stage.
    ///
    /// The submit waits on the image-available semaphore at the same stage,
    /// so the layout transition and the first color write happen after the
    /// presentation engine has released the image.
    pub fn acquire_dependency() -> vk::SubpassDependency {
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
    }

    /// Color attachment references for subpass 0, in attachment order.
    pub fn color_references(&self) -> Vec<vk::AttachmentReference> {
        (0..self.color_attachments.len() as u32)
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect()
    }
}

/// Image views bound to a render pass.
#[derive(Clone, Debug)]
pub struct FramebufferDesc {
    pub render_pass: vk::RenderPass,
    pub attachments: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
}

/// Parameters for beginning a render pass instance.
#[derive(Clone, Debug)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    /// One RGBA float color per attachment.
    pub clear_colors: Vec<[f32; 4]>,
}

impl RenderPassBegin {
    pub fn vk_clear_values(&self) -> Vec<vk::ClearValue> {
        self.clear_colors
            .iter()
            .map(|&float32| vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            })
            .collect()
    }

    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}
