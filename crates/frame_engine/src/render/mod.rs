//! Rendering core
//!
//! Frame slots and their synchronization, deferred destruction, the asset
//! registry, pipeline building and draw submission, on top of the
//! [`vulkan::GpuDevice`] abstraction.

pub mod assets;
pub mod deletion_queue;
pub mod descriptors;
pub mod draw;
pub mod engine;
pub mod frame;
pub mod gpu_data;
pub mod pipeline;
pub mod target;
pub mod upload;
pub mod vulkan;

pub use assets::{
    AssetRegistry, Material, MaterialId, Mesh, MeshData, MeshId, Texture, TextureId, TexturePixels, Vertex,
};
pub use deletion_queue::DeletionQueue;
pub use draw::{pad_uniform_buffer_size, DrawStats, RenderObject};
pub use engine::Engine;
pub use frame::{slot_index, FrameSlot, SlotState, FRAME_OVERLAP};
pub use gpu_data::{Camera, GpuCameraData, GpuObjectData, GpuSceneData, MeshPushConstants};
pub use pipeline::{PipelineBuilder, VertexInputDescription};
pub use target::{OffscreenTarget, RenderTarget};
pub use upload::UploadContext;
pub use vulkan::{GpuDevice, VulkanContext, VulkanError, VulkanResult};
