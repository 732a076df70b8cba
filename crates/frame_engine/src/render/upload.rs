//! Immediate submit: blocking one-shot GPU work for uploads
//!
//! Uses its own command pool, command buffer and fence, separate from the
//! frame slots. Every call stalls the host until the GPU is done, so it is
//! only used while loading assets, never in the frame loop.

use std::rc::Rc;

use ash::vk;

use super::deletion_queue::DeletionQueue;
use super::vulkan::{
    fatal, AllocatedBuffer, AllocatedImage, GpuDevice, ImageDesc, MemoryLocation, SubmitDesc, VulkanError,
    VulkanResult,
};

/// Dedicated command resources for immediate submission
#[derive(Debug)]
pub struct UploadContext {
    command_buffer: vk::CommandBuffer,
    upload_fence: vk::Fence,
    timeout_ns: u64,
}

impl UploadContext {
    pub fn new<D: GpuDevice + 'static>(
        device: &Rc<D>,
        timeout_ns: u64,
        deletion: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let command_pool = device.create_command_pool()?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_command_pool(command_pool));
        }
        let command_buffer = device.allocate_command_buffer(command_pool)?;

        let upload_fence = device.create_fence(false)?;
        let owner = Rc::clone(device);
        deletion.push(move || owner.destroy_fence(upload_fence));

        Ok(Self {
            command_buffer,
            upload_fence,
            timeout_ns,
        })
    }

    /// Record with `record`, submit, and block until the GPU has executed it
    ///
    /// On return every command recorded by `record` has completed, so any
    /// staging resources it used may be freed. A fence timeout or device loss
    /// aborts through [`fatal::abort`]: the copy may still be running and the
    /// command buffer is still pending, so neither can be touched again.
    pub fn submit<D, F>(&self, device: &D, record: F) -> VulkanResult<()>
    where
        D: GpuDevice,
        F: FnOnce(&D, vk::CommandBuffer),
    {
        match self.record_and_wait(device, record) {
            Ok(()) => Ok(()),
            Err(error) if error.is_fatal() => fatal::abort(&error, "immediate submit"),
            Err(error) => {
                // Nothing reached the queue, so the buffer is safe to recycle
                if let Err(reset_error) = device.reset_command_buffer(self.command_buffer) {
                    log::warn!("Failed to reset upload command buffer: {reset_error}");
                }
                Err(error)
            }
        }
    }

    fn record_and_wait<D, F>(&self, device: &D, record: F) -> VulkanResult<()>
    where
        D: GpuDevice,
        F: FnOnce(&D, vk::CommandBuffer),
    {
        let cmd = self.command_buffer;
        device.begin_command_buffer(cmd)?;
        record(device, cmd);
        device.end_command_buffer(cmd)?;

        device.queue_submit(&SubmitDesc {
            command_buffer: cmd,
            wait_semaphores: &[],
            wait_stages: &[],
            signal_semaphores: &[],
            fence: self.upload_fence,
        })?;
        device
            .wait_for_fence(self.upload_fence, self.timeout_ns)
            .map_err(|error| match error {
                VulkanError::Api(result) => VulkanError::from_wait(result, "immediate submit"),
                other => other,
            })?;

        device.reset_fence(self.upload_fence)?;
        device.reset_command_buffer(cmd)?;
        Ok(())
    }
}

/// Copy `data` into a new device-local buffer through a staging buffer
pub fn upload_buffer<D: GpuDevice + 'static>(
    device: &Rc<D>,
    upload: &UploadContext,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<AllocatedBuffer> {
    let size = data.len() as vk::DeviceSize;
    let mut staging_scope = DeletionQueue::new();

    let staging = device.create_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC, MemoryLocation::CpuOnly)?;
    {
        let owner = Rc::clone(device);
        staging_scope.push(move || owner.destroy_buffer(staging));
    }

    let result = device.write_buffer(&staging, 0, data).and_then(|()| {
        let gpu_buffer = device.create_buffer(size, usage | vk::BufferUsageFlags::TRANSFER_DST, MemoryLocation::GpuOnly)?;
        let copied = upload.submit(device.as_ref(), |device, cmd| {
            device.cmd_copy_buffer(cmd, staging.buffer, gpu_buffer.buffer, size);
        });
        match copied {
            Ok(()) => Ok(gpu_buffer),
            Err(error) => {
                device.destroy_buffer(gpu_buffer);
                Err(error)
            }
        }
    });

    staging_scope.flush();
    result
}

/// Copy tightly packed RGBA8 pixels into a new sampled image
///
/// The image ends in `SHADER_READ_ONLY_OPTIMAL`.
pub fn upload_image<D: GpuDevice + 'static>(
    device: &Rc<D>,
    upload: &UploadContext,
    pixels: &[u8],
    width: u32,
    height: u32,
    format: vk::Format,
) -> VulkanResult<AllocatedImage> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(VulkanError::InvalidOperation {
            reason: format!(
                "texture data is {} bytes, expected {expected} for {width}x{height} RGBA8",
                pixels.len()
            ),
        });
    }

    let mut staging_scope = DeletionQueue::new();
    let staging = device.create_buffer(
        pixels.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuOnly,
    )?;
    {
        let owner = Rc::clone(device);
        staging_scope.push(move || owner.destroy_buffer(staging));
    }

    let extent = vk::Extent3D { width, height, depth: 1 };
    let result = device.write_buffer(&staging, 0, pixels).and_then(|()| {
        let image = device.create_image(&ImageDesc {
            format,
            extent,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            location: MemoryLocation::GpuOnly,
        })?;
        let copied = upload.submit(device.as_ref(), |device, cmd| {
            device.cmd_transition_image_layout(
                cmd,
                image.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            device.cmd_copy_buffer_to_image(cmd, staging.buffer, image.image, extent);
            device.cmd_transition_image_layout(
                cmd,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        });
        match copied {
            Ok(()) => Ok(image),
            Err(error) => {
                device.destroy_image(image);
                Err(error)
            }
        }
    });

    staging_scope.flush();
    result
}
