//! Render-target image views.

use ash::vk;
use ash::vk::Handle;

/// An image view that can be bound as a render target.
///
/// Views are created and owned elsewhere (the swapchain or the resource
/// registry's producer). The frame core only needs the handle for
/// framebuffers and hashing, and the format for render pass attachments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageView {
    view: vk::ImageView,
    image: vk::Image,
    format: vk::Format,
}

impl ImageView {
    pub fn new(view: vk::ImageView, image: vk::Image, format: vk::Format) -> Self {
        Self {
            view,
            image,
            format,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Value used when hashing render-target bindings.
    #[inline]
    pub fn identity(&self) -> u64 {
        self.view.as_raw()
    }
}
