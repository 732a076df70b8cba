//! Device abstraction consumed by the renderer core
//!
//! Bootstrapping an instance, picking a GPU and creating queues is mechanical
//! setup; the core only needs the capabilities listed on [`GpuDevice`]. The
//! `ash` implementation is [`VulkanContext`](super::VulkanContext). Handles
//! are plain `ash::vk` handles so they can be copied into deferred cleanup
//! closures by value.

use ash::vk;

use super::VulkanResult;

/// Memory residency hint for buffer and image allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local memory, not host visible (vertex/index/image storage)
    GpuOnly,
    /// Host-visible, host-coherent memory written every frame (uniforms)
    CpuToGpu,
    /// Host-visible staging memory used as a copy source
    CpuOnly,
}

impl MemoryLocation {
    /// Memory property flags a memory type must have for this location
    pub fn required_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            Self::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            Self::CpuToGpu | Self::CpuOnly => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Whether the host may map memory at this location
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::GpuOnly)
    }
}

/// A buffer together with its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Backing memory
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// An image together with its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedImage {
    /// Image handle
    pub image: vk::Image,
    /// Backing memory
    pub memory: vk::DeviceMemory,
    /// Image extent
    pub extent: vk::Extent3D,
    /// Pixel format
    pub format: vk::Format,
}

/// Parameters for a 2D, single-mip image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Pixel format
    pub format: vk::Format,
    /// Image extent (depth is 1 for 2D images)
    pub extent: vk::Extent3D,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Residency hint
    pub location: MemoryLocation,
}

/// One command buffer submission to the graphics queue
#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc<'a> {
    /// Command buffer to execute
    pub command_buffer: vk::CommandBuffer,
    /// Semaphores the GPU waits on before executing
    pub wait_semaphores: &'a [vk::Semaphore],
    /// Pipeline stage each wait semaphore blocks
    pub wait_stages: &'a [vk::PipelineStageFlags],
    /// Semaphores signaled when execution completes
    pub signal_semaphores: &'a [vk::Semaphore],
    /// Fence signaled when execution completes (may be null)
    pub fence: vk::Fence,
}

/// Properties reported by the selected GPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Human readable device name
    pub device_name: String,
    /// Required alignment for dynamic uniform buffer offsets
    pub min_uniform_buffer_offset_alignment: vk::DeviceSize,
    /// Maximum push constant block size in bytes
    pub max_push_constants_size: u32,
}

/// GPU capabilities the renderer core relies on
///
/// Every method maps onto a single Vulkan call (or a small fixed sequence for
/// allocation). Destruction methods are infallible; creation methods surface
/// allocation failures to the caller.
pub trait GpuDevice {
    /// Properties of the selected GPU
    fn properties(&self) -> &DeviceProperties;

    /// Required alignment for dynamic uniform buffer offsets
    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.properties().min_uniform_buffer_offset_alignment
    }

    // === Synchronization ===

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);
    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Block until the fence signals or the timeout (nanoseconds) expires
    ///
    /// A timeout is reported as `VulkanError::Api(vk::Result::TIMEOUT)`.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VulkanResult<()>;
    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;
    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> VulkanResult<()>;

    // === Command buffers ===

    /// Create a resettable command pool on the graphics queue family
    fn create_command_pool(&self) -> VulkanResult<vk::CommandPool>;
    /// Destroy a command pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VulkanResult<vk::CommandBuffer>;
    /// Reset a command buffer to the initial state
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;
    /// Begin one-time-submit recording
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;
    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;
    /// Submit to the graphics queue
    fn queue_submit(&self, submit: &SubmitDesc<'_>) -> VulkanResult<()>;

    // === Memory ===

    /// Create a buffer with backing memory at the requested location
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> VulkanResult<AllocatedBuffer>;
    /// Copy bytes into a host-visible buffer at the given byte offset
    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()>;
    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: AllocatedBuffer);
    /// Create a 2D image with backing memory
    fn create_image(&self, desc: &ImageDesc) -> VulkanResult<AllocatedImage>;
    /// Destroy an image and free its memory
    fn destroy_image(&self, image: AllocatedImage);
    /// Create a 2D view over the whole image
    fn create_image_view(&self, image: &AllocatedImage, aspect: vk::ImageAspectFlags) -> VulkanResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Create a sampler with the given min/mag filter and repeat addressing
    fn create_sampler(&self, filter: vk::Filter) -> VulkanResult<vk::Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);

    // === Descriptors ===

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    /// Create a descriptor pool
    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[vk::DescriptorPoolSize]) -> VulkanResult<vk::DescriptorPool>;
    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocate one descriptor set
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<vk::DescriptorSet>;
    /// Point a buffer binding of a set at a buffer range
    fn write_buffer_descriptor(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    );
    /// Point a combined image sampler binding of a set at a view
    fn write_image_descriptor(&self, set: vk::DescriptorSet, binding: u32, sampler: vk::Sampler, view: vk::ImageView);

    // === Pipelines ===

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    /// Create a pipeline layout
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    /// Compile a graphics pipeline
    ///
    /// Rejected state combinations are reported as
    /// `VulkanError::PipelineCompilation`.
    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // === Render passes ===

    /// Create a render pass
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass>;
    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    /// Create a framebuffer compatible with the render pass
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer>;
    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // === Command recording ===

    /// Begin a render pass covering the whole extent with inline contents
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );
    /// End the current render pass
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    /// Bind descriptor sets starting at `first_set`
    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
    /// Bind a vertex buffer at binding 0, offset 0
    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    /// Bind a `u32` index buffer at offset 0
    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    /// Push constant data at offset 0
    fn cmd_push_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    );
    /// Non-indexed draw
    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    /// Indexed draw
    fn cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    /// Copy `size` bytes between buffers
    fn cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize);
    /// Copy tightly packed pixels from a buffer into a color image in
    /// `TRANSFER_DST_OPTIMAL` layout
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        extent: vk::Extent3D,
    );
    /// Record a pipeline barrier moving a color image between layouts
    fn cmd_transition_image_layout(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_location_flags() {
        assert_eq!(MemoryLocation::GpuOnly.required_flags(), vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(MemoryLocation::CpuToGpu
            .required_flags()
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        assert!(MemoryLocation::CpuOnly.is_host_visible());
        assert!(!MemoryLocation::GpuOnly.is_host_visible());
    }
}
