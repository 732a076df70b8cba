//! Vulkan device layer
//!
//! Error types, the [`GpuDevice`] capability trait and its `ash`
//! implementation.

pub mod context;
pub mod device;
pub mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use context::VulkanContext;
pub use device::{
    AllocatedBuffer, AllocatedImage, DeviceProperties, GpuDevice, ImageDesc, MemoryLocation, SubmitDesc,
};
pub use error::{fatal, VulkanError, VulkanResult};
