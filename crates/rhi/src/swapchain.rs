//! Swapchain state as seen by the frame core.
//!
//! Swapchain creation, format negotiation and recreation belong to the
//! window/device layer. The frame core receives a [`Swapchain`] snapshot
//! describing the presentable handle, its extent and format, and one
//! [`ImageView`] per swapchain image, and tracks which image is current.

use ash::vk;

use crate::error::{RhiError, RhiResult};
use crate::image::ImageView;

/// Presentable swapchain handle and its image views.
#[derive(Clone, Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    image_views: Vec<ImageView>,
    current_image_index: u32,
}

impl Swapchain {
    /// Wraps an externally created swapchain.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `image_views` is empty.
    pub fn from_raw_parts(
        handle: vk::SwapchainKHR,
        format: vk::Format,
        extent: vk::Extent2D,
        image_views: Vec<ImageView>,
    ) -> RhiResult<Self> {
        if image_views.is_empty() {
            return Err(RhiError::InvalidHandle(
                "swapchain has no image views".to_string(),
            ));
        }
        Ok(Self {
            handle,
            format,
            extent,
            image_views,
            current_image_index: 0,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn vk_extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> u32 {
        self.image_views.len() as u32
    }

    pub fn image_views(&self) -> &[ImageView] {
        &self.image_views
    }

    pub fn current_image_index(&self) -> u32 {
        self.current_image_index
    }

    /// Records the image returned by the last acquire.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `index` is not a valid image.
    pub fn set_current_image_index(&mut self, index: u32) -> RhiResult<()> {
        if index as usize >= self.image_views.len() {
            return Err(RhiError::InvalidHandle(format!(
                "swapchain image index {index} out of range ({} images)",
                self.image_views.len()
            )));
        }
        self.current_image_index = index;
        Ok(())
    }

    /// View of the currently acquired image.
    pub fn current_image_view(&self) -> ImageView {
        self.image_views[self.current_image_index as usize]
    }
}
