//! Render targets
//!
//! The frame loop only needs a render pass, a framebuffer per frame and to
//! know whether acquisition and presentation use the frame slot's semaphores.
//! A swapchain would signal the present semaphore on acquire and wait on the
//! render semaphore before presenting. [`OffscreenTarget`] renders into its
//! own images and uses neither.

use std::rc::Rc;

use ash::vk;

use super::deletion_queue::DeletionQueue;
use super::frame::SubmitSync;
use super::vulkan::{AllocatedImage, GpuDevice, ImageDesc, MemoryLocation, VulkanResult};

pub const OFFSCREEN_COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Image acquired for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub framebuffer: vk::Framebuffer,
    pub image_index: u32,
    /// Semaphores the frame submission has to wait on and signal
    pub sync: SubmitSync,
}

/// Something a frame can be rendered into
pub trait RenderTarget {
    fn render_pass(&self) -> vk::RenderPass;

    fn extent(&self) -> vk::Extent2D;

    /// Pick the image for the next frame
    ///
    /// Targets that present signal `present_semaphore` once the image is
    /// ready and report it through [`AcquiredImage::sync`].
    fn acquire(&mut self, present_semaphore: vk::Semaphore) -> VulkanResult<AcquiredImage>;

    /// Hand a rendered image on; `render_semaphore` is signaled when
    /// rendering finished if the acquired sync asked for it
    fn present(&mut self, image: &AcquiredImage, render_semaphore: vk::Semaphore) -> VulkanResult<()>;

    /// Clear values for the render pass attachments: color, then depth
    fn clear_values(&self, clear_color: [f32; 4]) -> Vec<vk::ClearValue> {
        vec![
            vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ]
    }
}

/// Color and depth images with a single framebuffer, never presented
#[derive(Debug)]
pub struct OffscreenTarget {
    color_image: AllocatedImage,
    depth_image: AllocatedImage,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    frames_rendered: u64,
}

impl OffscreenTarget {
    pub fn new<D: GpuDevice + 'static>(
        device: &Rc<D>,
        extent: vk::Extent2D,
        deletion: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let image_extent = vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        };

        let color_image = device.create_image(&ImageDesc {
            format: OFFSCREEN_COLOR_FORMAT,
            extent: image_extent,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            location: MemoryLocation::GpuOnly,
        })?;
        let color_view = device.create_image_view(&color_image, vk::ImageAspectFlags::COLOR)?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || {
                owner.destroy_image_view(color_view);
                owner.destroy_image(color_image);
            });
        }

        let depth_image = device.create_image(&ImageDesc {
            format: DEPTH_FORMAT,
            extent: image_extent,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            location: MemoryLocation::GpuOnly,
        })?;
        let depth_view = device.create_image_view(&depth_image, vk::ImageAspectFlags::DEPTH)?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || {
                owner.destroy_image_view(depth_view);
                owner.destroy_image(depth_image);
            });
        }

        let render_pass = create_render_pass(device.as_ref(), OFFSCREEN_COLOR_FORMAT)?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_render_pass(render_pass));
        }

        let framebuffer = device.create_framebuffer(render_pass, &[color_view, depth_view], extent)?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_framebuffer(framebuffer));
        }

        log::info!("Offscreen target {}x{} ready", extent.width, extent.height);
        Ok(Self {
            color_image,
            depth_image,
            render_pass,
            framebuffer,
            extent,
            frames_rendered: 0,
        })
    }

    pub fn color_image(&self) -> &AllocatedImage {
        &self.color_image
    }

    pub fn depth_image(&self) -> &AllocatedImage {
        &self.depth_image
    }

    /// Frames handed to [`RenderTarget::present`] so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl RenderTarget for OffscreenTarget {
    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire(&mut self, _present_semaphore: vk::Semaphore) -> VulkanResult<AcquiredImage> {
        Ok(AcquiredImage {
            framebuffer: self.framebuffer,
            image_index: 0,
            sync: SubmitSync::default(),
        })
    }

    fn present(&mut self, _image: &AcquiredImage, _render_semaphore: vk::Semaphore) -> VulkanResult<()> {
        self.frames_rendered += 1;
        Ok(())
    }
}

/// Single-subpass render pass with one color and one depth attachment
///
/// Color is cleared and stored, ending in `TRANSFER_SRC_OPTIMAL` for readback.
pub fn create_render_pass<D: GpuDevice>(device: &D, color_format: vk::Format) -> VulkanResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .build(),
        vk::AttachmentDescription::builder()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build(),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)
        .build()];

    let dependencies = [
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build(),
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .dst_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
            .build(),
    ];

    let info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    device.create_render_pass(&info)
}
