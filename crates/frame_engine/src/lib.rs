//! # Frame Engine
//!
//! The core of a Vulkan frame renderer: overlapping in-flight frames,
//! deferred destruction of GPU objects, a registry of meshes, materials and
//! textures, and batched draw submission with alignment-correct uniform
//! uploads.
//!
//! Everything talks to the GPU through [`render::GpuDevice`]. The `ash`
//! implementation is [`render::VulkanContext`]; presentation is abstracted by
//! [`render::RenderTarget`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use frame_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     frame_engine::foundation::logging::init();
//!     let config = RendererConfig::new("demo");
//!     let extent = ash::vk::Extent2D { width: 1700, height: 900 };
//!     let device = Rc::new(VulkanContext::new(&config)?);
//!     let mut engine = Engine::init(device, config, |device, deletion| {
//!         OffscreenTarget::new(device, extent, deletion)
//!     })?;
//!     let _triangle = engine.upload_mesh("triangle", &MeshData::triangle())?;
//!     engine.cleanup();
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{Config, ConfigError, RendererConfig, ShaderConfig, ShaderPair};
    pub use crate::foundation::math::{Mat4, Vec3, Vec4};
    pub use crate::render::{
        Camera, DrawStats, Engine, GpuDevice, MaterialId, MeshData, MeshId, OffscreenTarget,
        PipelineBuilder, RenderObject, RenderTarget, TextureId, TexturePixels, VulkanContext, VulkanError,
        VulkanResult, FRAME_OVERLAP,
    };
    pub use crate::render::vulkan::fatal;
}
