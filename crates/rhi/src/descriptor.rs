//! Descriptor set slots bound by the state cache.
//!
//! Descriptor pools and writes are managed by whoever owns the resources.
//! The frame core only records which set (and its layout) is bound in each
//! slot so it can derive a pipeline layout and bind the sets at commit time.
//!
//! Slot layout:
//!
//! ```text
//! set 0        structured (storage) buffer
//! set 1..=3    uniform buffers, slot i at set i + 1
//! ```

use ash::vk;
use ash::vk::Handle;

use crate::error::RhiResult;

/// Set index of the structured buffer.
pub const STRUCTURED_BUFFER_SET: u32 = 0;

/// Number of uniform-buffer slots.
pub const MAX_UNIFORM_SLOTS: usize = 3;

/// A descriptor set together with the layout it was allocated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub layout: vk::DescriptorSetLayout,
    pub set: vk::DescriptorSet,
}

impl DescriptorBinding {
    pub fn new(layout: vk::DescriptorSetLayout, set: vk::DescriptorSet) -> Self {
        Self { layout, set }
    }

    /// Identity of the layout, which is what pipeline layouts depend on.
    #[inline]
    pub fn layout_identity(&self) -> u64 {
        self.layout.as_raw()
    }
}

/// Set index used for uniform slot `slot`.
#[inline]
pub const fn uniform_set_index(slot: usize) -> u32 {
    slot as u32 + 1
}

/// A host-visible storage buffer bound at [`STRUCTURED_BUFFER_SET`].
///
/// Memory and descriptor management stay with the implementor; the frame
/// core only writes bytes into it and binds its set.
pub trait StructuredBuffer: Send {
    /// Descriptor set that exposes the buffer to shaders.
    fn binding(&self) -> DescriptorBinding;

    /// Size of the buffer in bytes.
    fn capacity(&self) -> usize;

    /// Copies `bytes` into the buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the memory cannot be mapped or flushed.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> RhiResult<()>;
}
