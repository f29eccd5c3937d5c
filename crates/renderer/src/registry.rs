//! Logical resource ids mapped to live image views.
//!
//! Render targets are usually named rather than passed around as views.
//! The registry maps a [`ResourceId`] to the [`ImageView`] currently
//! backing it. Transient entries live for one frame and are dropped by
//! [`ResourceRegistry::clean_up_frame`], which the orchestrator calls after
//! every present. Persistent entries survive until removed.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use vkframe_rhi::image::ImageView;

use crate::error::{EngineError, EngineResult};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hashed resource name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Hashes `name` with 32-bit FNV-1a.
    ///
    /// # Example
    ///
    /// ```
    /// use vkframe_renderer::registry::ResourceId;
    ///
    /// const GBUFFER: ResourceId = ResourceId::from_name("gbuffer.albedo");
    /// assert_eq!(GBUFFER, ResourceId::from_name("gbuffer.albedo"));
    /// ```
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// How long a registered view stays valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// Dropped at the end of the frame.
    Transient,
    /// Kept until removed.
    Persistent,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    view: ImageView,
    lifetime: Lifetime,
}

/// Map from resource id to image view.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceId, Entry>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &mut self,
        id: ResourceId,
        view: ImageView,
        lifetime: Lifetime,
    ) -> Option<ImageView> {
        self.entries
            .insert(id, Entry { view, lifetime })
            .map(|previous| previous.view)
    }

    /// Registers a view for the current frame only. Returns the view it
    /// replaced, if any.
    pub fn register_transient(&mut self, id: ResourceId, view: ImageView) -> Option<ImageView> {
        self.register(id, view, Lifetime::Transient)
    }

    /// Registers a view that survives frame boundaries.
    pub fn register_persistent(&mut self, id: ResourceId, view: ImageView) -> Option<ImageView> {
        self.register(id, view, Lifetime::Persistent)
    }

    /// Looks up the view registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownResource`] if nothing is registered.
    pub fn image_view(&self, id: ResourceId) -> EngineResult<ImageView> {
        self.entries
            .get(&id)
            .map(|entry| entry.view)
            .ok_or(EngineError::UnknownResource(id))
    }

    pub fn lifetime(&self, id: ResourceId) -> Option<Lifetime> {
        self.entries.get(&id).map(|entry| entry.lifetime)
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<ImageView> {
        self.entries.remove(&id).map(|entry| entry.view)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every transient entry. Returns how many were dropped.
    pub fn clean_up_frame(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.lifetime == Lifetime::Persistent);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            trace!("Dropped {} transient resource(s)", dropped);
        }
        dropped
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use ash::vk::Handle;

    fn view(raw: u64) -> ImageView {
        ImageView::new(
            vk::ImageView::from_raw(raw),
            vk::Image::from_raw(raw + 1),
            vk::Format::B8G8R8A8_SRGB,
        )
    }

    #[test]
    fn test_from_name_matches_fnv1a() {
        // Published FNV-1a test vectors.
        assert_eq!(ResourceId::from_name("").raw(), 0x811c_9dc5);
        assert_eq!(ResourceId::from_name("a").raw(), 0xe40c_292c);
        assert_eq!(ResourceId::from_name("foobar").raw(), 0xbf9c_f968);
    }

    #[test]
    fn test_lookup_miss_is_error() {
        let registry = ResourceRegistry::new();
        let id = ResourceId::from_name("missing");
        assert!(matches!(
            registry.image_view(id),
            Err(EngineError::UnknownResource(miss)) if miss == id
        ));
    }

    #[test]
    fn test_clean_up_frame_keeps_persistent() {
        let mut registry = ResourceRegistry::new();
        let transient = ResourceId::from_name("bloom");
        let persistent = ResourceId::from_name("shadow_map");
        registry.register_transient(transient, view(10));
        registry.register_persistent(persistent, view(20));

        assert_eq!(registry.clean_up_frame(), 1);
        assert!(registry.image_view(transient).is_err());
        assert_eq!(registry.image_view(persistent).unwrap(), view(20));
        assert_eq!(registry.lifetime(persistent), Some(Lifetime::Persistent));
    }

    #[test]
    fn test_register_returns_replaced_view() {
        let mut registry = ResourceRegistry::new();
        let id = ResourceId::from_name("color");
        assert!(registry.register_transient(id, view(1)).is_none());
        assert_eq!(registry.register_transient(id, view(2)), Some(view(1)));
        assert_eq!(registry.len(), 1);
    }
}
