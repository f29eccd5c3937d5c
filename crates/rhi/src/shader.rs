//! Shader identities consumed by pipeline creation.
//!
//! Shader compilation and SPIR-V loading happen outside this crate. What
//! the execution core needs is a stable identity per shader permutation:
//!
//! - [`ShaderKey`] names a permutation (base shader id plus define mask)
//! - [`ShaderModule`] is a pre-resolved `VkShaderModule` handle tagged with
//!   its stage and key
//! - [`ShaderProvider`] looks modules up by key; [`ShaderLibrary`] is the
//!   in-memory implementation
//!
//! # Example
//!
//! ```
//! use vkframe_rhi::shader::{ShaderKey, ShaderLibrary, ShaderModule, ShaderProvider, ShaderStage};
//! use vkframe_rhi::vk::{self, Handle};
//!
//! # fn example() -> Result<(), vkframe_rhi::RhiError> {
//! let key = ShaderKey::combine(7, 0b10);
//! let mut library = ShaderLibrary::new();
//! library.register(ShaderModule::new(
//!     vk::ShaderModule::from_raw(0x10),
//!     ShaderStage::Vertex,
//!     key,
//! ))?;
//!
//! assert_eq!(library.shader(key).map(|m| m.stage()), Some(ShaderStage::Vertex));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;

use ash::vk;
use ash::vk::Handle;

use crate::error::{RhiError, RhiResult};

/// Entry point shared by every shader module.
pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Shader pipeline stage.
///
/// Defines which stage of the graphics or compute pipeline
/// the shader will be used in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
    /// Compute shader stage - general-purpose GPU computation
    Compute,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identity of one shader permutation.
///
/// The low 16 bits hold the base shader id and the high 16 bits the
/// permutation define mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderKey(u32);

impl ShaderKey {
    /// Bit position of the define mask.
    pub const DEFINE_SHIFT: u32 = 16;
    /// Mask selecting the base shader id.
    pub const BASE_MASK: u32 = 0x0000_FFFF;
    /// Mask selecting the define bits.
    pub const DEFINE_MASK: u32 = 0xFFFF_0000;

    /// Wraps a raw key.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Builds a key from a base shader id and a permutation define mask.
    pub const fn combine(base: u16, defines: u16) -> Self {
        Self(base as u32 | ((defines as u32) << Self::DEFINE_SHIFT))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn base(self) -> u16 {
        (self.0 & Self::BASE_MASK) as u16
    }

    pub const fn defines(self) -> u16 {
        ((self.0 & Self::DEFINE_MASK) >> Self::DEFINE_SHIFT) as u16
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}[{:#06x}]", self.base(), self.defines())
    }
}

/// A compiled shader module as seen by pipeline creation.
///
/// This is a non-owning identity: the module is created and destroyed by
/// whoever compiled it. Two `ShaderModule`s are equal when they refer to the
/// same `VkShaderModule`, which is stable for the life of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderModule {
    module: vk::ShaderModule,
    stage: ShaderStage,
    key: ShaderKey,
}

impl ShaderModule {
    pub fn new(module: vk::ShaderModule, stage: ShaderStage, key: ShaderKey) -> Self {
        Self { module, stage, key }
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn key(&self) -> ShaderKey {
        self.key
    }

    /// Value used when hashing pipeline state.
    #[inline]
    pub fn identity(&self) -> u64 {
        self.module.as_raw()
    }

    /// Creates the shader stage info for pipeline creation.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
    }
}

/// Source of shader modules by permutation key.
pub trait ShaderProvider {
    /// Returns the module registered for `key`, if any.
    fn shader(&self, key: ShaderKey) -> Option<ShaderModule>;
}

/// In-memory [`ShaderProvider`].
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    modules: HashMap<ShaderKey, ShaderModule>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module under its key.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DuplicateShader`] if the key is already taken.
    pub fn register(&mut self, module: ShaderModule) -> RhiResult<()> {
        if self.modules.contains_key(&module.key()) {
            return Err(RhiError::DuplicateShader(module.key()));
        }
        self.modules.insert(module.key(), module);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ShaderProvider for ShaderLibrary {
    fn shader(&self, key: ShaderKey) -> Option<ShaderModule> {
        self.modules.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            ShaderStage::Compute.to_vk_stage(),
            vk::ShaderStageFlags::COMPUTE
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Compute), "compute");
    }

    #[test]
    fn test_shader_key_layout() {
        let key = ShaderKey::combine(0x1234, 0x0003);
        assert_eq!(key.raw(), 0x0003_1234);
        assert_eq!(key.base(), 0x1234);
        assert_eq!(key.defines(), 0x0003);
        assert_eq!(ShaderKey::from_raw(key.raw()), key);
    }

    #[test]
    fn test_permutations_are_distinct() {
        assert_ne!(ShaderKey::combine(1, 0), ShaderKey::combine(1, 1));
        assert_ne!(ShaderKey::combine(1, 0), ShaderKey::combine(2, 0));
    }

    #[test]
    fn test_library_rejects_duplicates() {
        let key = ShaderKey::combine(1, 0);
        let module = ShaderModule::new(vk::ShaderModule::from_raw(1), ShaderStage::Vertex, key);

        let mut library = ShaderLibrary::new();
        library.register(module).unwrap();
        assert!(matches!(
            library.register(module),
            Err(RhiError::DuplicateShader(k)) if k == key
        ));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_stage_create_info_uses_main() {
        let module = ShaderModule::new(
            vk::ShaderModule::from_raw(9),
            ShaderStage::Compute,
            ShaderKey::combine(3, 0),
        );
        let info = module.stage_create_info();
        assert_eq!(info.stage, vk::ShaderStageFlags::COMPUTE);
        assert_eq!(info.module, module.handle());
        assert_eq!(info.p_name, SHADER_ENTRY_POINT.as_ptr());
    }
}
