//! Graphics pipeline construction
//!
//! [`PipelineBuilder`] is plain data: configure it, call
//! [`build`](PipelineBuilder::build) as often as needed (for example once
//! solid and once wireframe), and each call compiles an independent pipeline
//! against a fixed viewport and scissor.

use std::ffi::CStr;
use std::fs::File;
use std::mem::size_of;
use std::path::Path;

use ash::vk;

use super::assets::Vertex;
use super::descriptors::DescriptorLayouts;
use super::gpu_data::MeshPushConstants;
use super::vulkan::{GpuDevice, VulkanError, VulkanResult};

// SAFETY: literal is NUL terminated with no interior NUL
const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Read a SPIR-V file and create a shader module from it
pub fn load_shader_module<D: GpuDevice, P: AsRef<Path>>(device: &D, path: P) -> VulkanResult<vk::ShaderModule> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|error| {
        log::error!("Failed to open shader {}: {error}", path.display());
        VulkanError::Io(error)
    })?;
    let code = ash::util::read_spv(&mut file)?;
    let module = device.create_shader_module(&code)?;
    log::debug!("Loaded shader module {} ({} words)", path.display(), code.len());
    Ok(module)
}

/// Vertex buffer bindings and attributes for a pipeline
#[derive(Debug, Clone, Default)]
pub struct VertexInputDescription {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputDescription {
    /// Layout of [`Vertex`]: position, normal, color, uv at locations 0..=3
    pub fn for_vertex() -> Self {
        let attribute = |location: u32, format: vk::Format, offset: u32| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format,
            offset,
        };
        Self {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: size_of::<Vertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![
                attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
                attribute(1, vk::Format::R32G32B32_SFLOAT, 12),
                attribute(2, vk::Format::R32G32B32_SFLOAT, 24),
                attribute(3, vk::Format::R32G32_SFLOAT, 36),
            ],
        }
    }
}

/// One shader stage of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
}

/// Accumulated fixed-function and shader state for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    pub shader_stages: Vec<ShaderStage>,
    pub vertex_input: VertexInputDescription,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    pub blend_enable: bool,
    pub extent: vk::Extent2D,
    pub pipeline_layout: vk::PipelineLayout,
}

impl PipelineBuilder {
    /// Opaque triangle-list pipeline with depth testing and no culling
    pub fn new(pipeline_layout: vk::PipelineLayout, extent: vk::Extent2D) -> Self {
        Self {
            shader_stages: Vec::new(),
            vertex_input: VertexInputDescription::default(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
            blend_enable: false,
            extent,
            pipeline_layout,
        }
    }

    pub fn with_shader(mut self, stage: vk::ShaderStageFlags, module: vk::ShaderModule) -> Self {
        self.shader_stages.push(ShaderStage { stage, module });
        self
    }

    pub fn with_vertex_input(mut self, vertex_input: VertexInputDescription) -> Self {
        self.vertex_input = vertex_input;
        self
    }

    pub fn with_polygon_mode(mut self, polygon_mode: vk::PolygonMode) -> Self {
        self.polygon_mode = polygon_mode;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Configure depth testing; `compare_op` is ignored when `test` is false
    pub fn with_depth_test(mut self, test: bool, write: bool, compare_op: vk::CompareOp) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self.depth_compare_op = if test { compare_op } else { vk::CompareOp::ALWAYS };
        self
    }

    pub fn with_blending(mut self, enable: bool) -> Self {
        self.blend_enable = enable;
        self
    }

    fn validate(&self, render_pass: vk::RenderPass) -> VulkanResult<()> {
        let reject = |reason: &str| {
            Err(VulkanError::PipelineCompilation {
                reason: reason.to_string(),
            })
        };
        if !self
            .shader_stages
            .iter()
            .any(|stage| stage.stage == vk::ShaderStageFlags::VERTEX)
        {
            return reject("no vertex shader stage");
        }
        if self.shader_stages.iter().any(|stage| stage.module == vk::ShaderModule::null()) {
            return reject("shader stage with null module");
        }
        if self.pipeline_layout == vk::PipelineLayout::null() {
            return reject("pipeline layout is null");
        }
        if render_pass == vk::RenderPass::null() {
            return reject("render pass is null");
        }
        if self.extent.width == 0 || self.extent.height == 0 {
            return reject("viewport extent is empty");
        }
        Ok(())
    }

    /// Compile the accumulated state into a pipeline for `render_pass`
    ///
    /// Invalid combinations are reported as
    /// [`VulkanError::PipelineCompilation`] before anything is created.
    pub fn build<D: GpuDevice>(&self, device: &D, render_pass: vk::RenderPass) -> VulkanResult<vk::Pipeline> {
        self.validate(render_pass)?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = self
            .shader_stages
            .iter()
            .map(|stage| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(stage.stage)
                    .module(stage.module)
                    .name(ENTRY_POINT)
                    .build()
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .vertex_attribute_descriptions(&self.vertex_input.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(self.topology)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(self.samples)
            .min_sample_shading(1.0);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(self.blend_enable)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(self.pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = device.create_graphics_pipeline(&pipeline_info)?;
        log::debug!(
            "Built pipeline with {} stages ({:?}, {}x{})",
            stages.len(),
            self.polygon_mode,
            self.extent.width,
            self.extent.height
        );
        Ok(pipeline)
    }
}

/// Push constant range carrying [`MeshPushConstants`] to the vertex stage
pub fn mesh_push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: size_of::<MeshPushConstants>() as u32,
    }
}

/// Layout for untextured meshes: sets 0 (global) and 1 (object)
pub fn create_mesh_pipeline_layout<D: GpuDevice>(
    device: &D,
    layouts: &DescriptorLayouts,
) -> VulkanResult<vk::PipelineLayout> {
    device.create_pipeline_layout(&[layouts.global, layouts.object], &[mesh_push_constant_range()])
}

/// Layout for textured meshes: sets 0, 1 and 2 (texture)
pub fn create_textured_pipeline_layout<D: GpuDevice>(
    device: &D,
    layouts: &DescriptorLayouts,
) -> VulkanResult<vk::PipelineLayout> {
    device.create_pipeline_layout(
        &[layouts.global, layouts.object, layouts.single_texture],
        &[mesh_push_constant_range()],
    )
}
