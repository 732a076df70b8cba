//! Recording device used by unit tests
//!
//! Hands out fake handles, remembers every call in order and can be told to
//! time out fence waits or reject pipelines.

use std::cell::{Cell, RefCell};

use ash::vk::{self, Handle};

use super::device::{
    AllocatedBuffer, AllocatedImage, DeviceProperties, GpuDevice, ImageDesc, MemoryLocation, SubmitDesc,
};
use super::{VulkanError, VulkanResult};

/// One observed device call
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    WaitIdle,
    ResetCommandBuffer(vk::CommandBuffer),
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    Submit {
        command_buffer: vk::CommandBuffer,
        wait_semaphores: Vec<vk::Semaphore>,
        signal_semaphores: Vec<vk::Semaphore>,
        fence: vk::Fence,
    },
    CreateBuffer {
        buffer: vk::Buffer,
        size: vk::DeviceSize,
        location: MemoryLocation,
    },
    WriteBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        data: Vec<u8>,
    },
    WriteBufferDescriptor {
        set: vk::DescriptorSet,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    },
    WriteImageDescriptor {
        set: vk::DescriptorSet,
        view: vk::ImageView,
    },
    CreatePipeline {
        stage_count: u32,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        polygon_mode: vk::PolygonMode,
    },
    Destroy(&'static str, u64),
    BeginRenderPass {
        framebuffer: vk::Framebuffer,
    },
    EndRenderPass,
    BindPipeline(vk::Pipeline),
    BindDescriptorSets {
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },
    BindVertexBuffer(vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    PushConstants(Vec<u8>),
    Draw {
        vertex_count: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_instance: u32,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    },
    CopyBufferToImage {
        src: vk::Buffer,
        image: vk::Image,
    },
    TransitionImage {
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    },
}

/// Device double that records calls instead of talking to a GPU
pub struct MockDevice {
    properties: DeviceProperties,
    next_handle: Cell<u64>,
    events: RefCell<Vec<MockEvent>>,
    fence_wait_result: Cell<Option<vk::Result>>,
    reject_pipelines: Cell<bool>,
    fail_allocations_above: Cell<Option<vk::DeviceSize>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_alignment(256)
    }

    pub fn with_alignment(alignment: vk::DeviceSize) -> Self {
        Self {
            properties: DeviceProperties {
                device_name: "Mock GPU".to_string(),
                min_uniform_buffer_offset_alignment: alignment,
                max_push_constants_size: 128,
            },
            next_handle: Cell::new(1),
            events: RefCell::new(Vec::new()),
            fence_wait_result: Cell::new(None),
            reject_pipelines: Cell::new(false),
            fail_allocations_above: Cell::new(None),
        }
    }

    /// Make every following fence wait fail with `result`
    pub fn fail_fence_waits(&self, result: vk::Result) {
        self.fence_wait_result.set(Some(result));
    }

    /// Make every following pipeline creation fail
    pub fn reject_pipelines(&self, reject: bool) {
        self.reject_pipelines.set(reject);
    }

    /// Fail buffer allocations larger than `size` bytes
    pub fn fail_allocations_above(&self, size: vk::DeviceSize) {
        self.fail_allocations_above.set(Some(size));
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }

    /// Destroyed objects in destruction order
    pub fn destroyed(&self) -> Vec<(&'static str, u64)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                MockEvent::Destroy(kind, raw) => Some((*kind, *raw)),
                _ => None,
            })
            .collect()
    }

    fn handle<H: Handle>(&self) -> H {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        H::from_raw(raw)
    }

    fn record(&self, event: MockEvent) {
        self.events.borrow_mut().push(event);
    }

    fn destroyed_handle(&self, kind: &'static str, handle: impl Handle) {
        self.record(MockEvent::Destroy(kind, handle.as_raw()));
    }
}

impl GpuDevice for MockDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_fence(&self, _signaled: bool) -> VulkanResult<vk::Fence> {
        Ok(self.handle())
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.destroyed_handle("fence", fence);
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        Ok(self.handle())
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroyed_handle("semaphore", semaphore);
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VulkanResult<()> {
        self.record(MockEvent::WaitFence(fence));
        match self.fence_wait_result.get() {
            Some(result) => Err(VulkanError::Api(result)),
            None => Ok(()),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        self.record(MockEvent::ResetFence(fence));
        Ok(())
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        self.record(MockEvent::WaitIdle);
        Ok(())
    }

    fn create_command_pool(&self) -> VulkanResult<vk::CommandPool> {
        Ok(self.handle())
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroyed_handle("command_pool", pool);
    }

    fn allocate_command_buffer(&self, _pool: vk::CommandPool) -> VulkanResult<vk::CommandBuffer> {
        Ok(self.handle())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.record(MockEvent::ResetCommandBuffer(command_buffer));
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.record(MockEvent::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.record(MockEvent::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn queue_submit(&self, submit: &SubmitDesc<'_>) -> VulkanResult<()> {
        self.record(MockEvent::Submit {
            command_buffer: submit.command_buffer,
            wait_semaphores: submit.wait_semaphores.to_vec(),
            signal_semaphores: submit.signal_semaphores.to_vec(),
            fence: submit.fence,
        });
        Ok(())
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> VulkanResult<AllocatedBuffer> {
        if let Some(limit) = self.fail_allocations_above.get() {
            if size > limit {
                return Err(VulkanError::from_allocation(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, size));
            }
        }
        let buffer = AllocatedBuffer {
            buffer: self.handle(),
            memory: self.handle(),
            size,
        };
        self.record(MockEvent::CreateBuffer {
            buffer: buffer.buffer,
            size,
            location,
        });
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        if offset + data.len() as vk::DeviceSize > buffer.size {
            return Err(VulkanError::InvalidOperation {
                reason: "write past end of buffer".to_string(),
            });
        }
        self.record(MockEvent::WriteBuffer {
            buffer: buffer.buffer,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        self.destroyed_handle("buffer", buffer.buffer);
    }

    fn create_image(&self, desc: &ImageDesc) -> VulkanResult<AllocatedImage> {
        Ok(AllocatedImage {
            image: self.handle(),
            memory: self.handle(),
            extent: desc.extent,
            format: desc.format,
        })
    }

    fn destroy_image(&self, image: AllocatedImage) {
        self.destroyed_handle("image", image.image);
    }

    fn create_image_view(&self, _image: &AllocatedImage, _aspect: vk::ImageAspectFlags) -> VulkanResult<vk::ImageView> {
        Ok(self.handle())
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroyed_handle("image_view", view);
    }

    fn create_sampler(&self, _filter: vk::Filter) -> VulkanResult<vk::Sampler> {
        Ok(self.handle())
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.destroyed_handle("sampler", sampler);
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        Ok(self.handle())
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroyed_handle("descriptor_set_layout", layout);
    }

    fn create_descriptor_pool(&self, _max_sets: u32, _sizes: &[vk::DescriptorPoolSize]) -> VulkanResult<vk::DescriptorPool> {
        Ok(self.handle())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroyed_handle("descriptor_pool", pool);
    }

    fn allocate_descriptor_set(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<vk::DescriptorSet> {
        Ok(self.handle())
    }

    fn write_buffer_descriptor(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        self.record(MockEvent::WriteBufferDescriptor {
            set,
            binding,
            descriptor_type,
            buffer,
            range,
        });
    }

    fn write_image_descriptor(&self, set: vk::DescriptorSet, _binding: u32, _sampler: vk::Sampler, view: vk::ImageView) {
        self.record(MockEvent::WriteImageDescriptor { set, view });
    }

    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(VulkanError::Api(vk::Result::ERROR_INVALID_SHADER_NV));
        }
        Ok(self.handle())
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroyed_handle("shader_module", module);
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout> {
        Ok(self.handle())
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroyed_handle("pipeline_layout", layout);
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline> {
        let polygon_mode = if info.p_rasterization_state.is_null() {
            vk::PolygonMode::FILL
        } else {
            // SAFETY: non-null and borrowed from the caller's builder for the call
            unsafe { (*info.p_rasterization_state).polygon_mode }
        };
        self.record(MockEvent::CreatePipeline {
            stage_count: info.stage_count,
            layout: info.layout,
            render_pass: info.render_pass,
            polygon_mode,
        });
        if self.reject_pipelines.get() {
            return Err(VulkanError::PipelineCompilation {
                reason: "mock device rejected the pipeline".to_string(),
            });
        }
        Ok(self.handle())
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroyed_handle("pipeline", pipeline);
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass> {
        Ok(self.handle())
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroyed_handle("render_pass", render_pass);
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        Ok(self.handle())
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroyed_handle("framebuffer", framebuffer);
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) {
        self.record(MockEvent::BeginRenderPass { framebuffer });
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.record(MockEvent::EndRenderPass);
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(MockEvent::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.record(MockEvent::BindDescriptorSets {
            first_set,
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn cmd_bind_vertex_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(MockEvent::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(MockEvent::BindIndexBuffer(buffer));
    }

    fn cmd_push_constants(
        &self,
        _command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _stages: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        self.record(MockEvent::PushConstants(data.to_vec()));
    }

    fn cmd_draw(
        &self,
        _command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        first_instance: u32,
    ) {
        self.record(MockEvent::Draw {
            vertex_count,
            first_instance,
        });
    }

    fn cmd_draw_indexed(
        &self,
        _command_buffer: vk::CommandBuffer,
        index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        first_instance: u32,
    ) {
        self.record(MockEvent::DrawIndexed {
            index_count,
            first_instance,
        });
    }

    fn cmd_copy_buffer(&self, _command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        self.record(MockEvent::CopyBuffer { src, dst, size });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        _command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        _extent: vk::Extent3D,
    ) {
        self.record(MockEvent::CopyBufferToImage { src, image });
    }

    fn cmd_transition_image_layout(
        &self,
        _command_buffer: vk::CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        self.record(MockEvent::TransitionImage {
            image,
            old_layout,
            new_layout,
        });
    }
}
