//! Per-frame resources and the frame-overlap state machine
//!
//! [`FRAME_OVERLAP`] slots are cycled round-robin by frame number. A slot moves
//! `Idle -> Recording -> Submitted` and back to `Idle` once its fence has been
//! observed signaled, which only happens at the start of the next recording of
//! the same slot. The host can therefore run at most `FRAME_OVERLAP - 1`
//! frames ahead of the GPU.

use std::mem::size_of;
use std::rc::Rc;

use ash::vk;

use super::deletion_queue::DeletionQueue;
use super::descriptors::DescriptorLayouts;
use super::gpu_data::{GpuCameraData, GpuObjectData, GpuSceneData};
use super::vulkan::{AllocatedBuffer, GpuDevice, MemoryLocation, SubmitDesc, VulkanError, VulkanResult};

/// Number of frames that may be in flight at once
pub const FRAME_OVERLAP: usize = 2;

/// Slot used by a given frame
pub fn slot_index(frame_number: u64) -> usize {
    (frame_number % FRAME_OVERLAP as u64) as usize
}

/// Lifecycle of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Prior work (if any) has been observed complete
    Idle,
    /// The host is recording into the command buffer
    Recording,
    /// Submitted; the fence signals when the GPU is done
    Submitted,
}

/// Which semaphores a submission uses, decided by the render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitSync {
    /// Wait on the slot's present semaphore before color output
    pub wait_present: bool,
    /// Signal the slot's render semaphore for presentation
    pub signal_render: bool,
}

/// One independently synchronized set of per-frame resources
#[derive(Debug)]
pub struct FrameSlot {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub present_semaphore: vk::Semaphore,
    pub render_semaphore: vk::Semaphore,
    pub render_fence: vk::Fence,
    pub camera_buffer: AllocatedBuffer,
    /// Storage buffer with room for `max_objects` [`GpuObjectData`] entries
    pub object_buffer: AllocatedBuffer,
    pub global_descriptor: vk::DescriptorSet,
    pub object_descriptor: vk::DescriptorSet,
    state: SlotState,
}

impl FrameSlot {
    /// Create the slot's resources and queue their destruction
    ///
    /// The fence starts signaled so the first wait returns immediately.
    pub fn new<D: GpuDevice + 'static>(
        device: &Rc<D>,
        layouts: &DescriptorLayouts,
        descriptor_pool: vk::DescriptorPool,
        scene_buffer: &AllocatedBuffer,
        max_objects: usize,
        deletion: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let command_pool = device.create_command_pool()?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_command_pool(command_pool));
        }
        let command_buffer = device.allocate_command_buffer(command_pool)?;

        let render_fence = device.create_fence(true)?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_fence(render_fence));
        }
        let present_semaphore = device.create_semaphore()?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_semaphore(present_semaphore));
        }
        let render_semaphore = device.create_semaphore()?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_semaphore(render_semaphore));
        }

        let camera_buffer = device.create_buffer(
            size_of::<GpuCameraData>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_buffer(camera_buffer));
        }

        let object_buffer = device.create_buffer(
            (size_of::<GpuObjectData>() * max_objects.max(1)) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        {
            let owner = Rc::clone(device);
            deletion.push(move || owner.destroy_buffer(object_buffer));
        }

        let global_descriptor = device.allocate_descriptor_set(descriptor_pool, layouts.global)?;
        let object_descriptor = device.allocate_descriptor_set(descriptor_pool, layouts.object)?;

        device.write_buffer_descriptor(
            global_descriptor,
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            camera_buffer.buffer,
            0,
            camera_buffer.size,
        );
        // Range covers one slot's region; the dynamic offset selects which one
        device.write_buffer_descriptor(
            global_descriptor,
            1,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            scene_buffer.buffer,
            0,
            size_of::<GpuSceneData>() as vk::DeviceSize,
        );
        device.write_buffer_descriptor(
            object_descriptor,
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            object_buffer.buffer,
            0,
            object_buffer.size,
        );

        Ok(Self {
            command_pool,
            command_buffer,
            present_semaphore,
            render_semaphore,
            render_fence,
            camera_buffer,
            object_buffer,
            global_descriptor,
            object_descriptor,
            state: SlotState::Idle,
        })
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Capacity of the object buffer in entries
    pub fn object_capacity(&self) -> usize {
        self.object_buffer.size as usize / size_of::<GpuObjectData>()
    }

    /// Wait for the slot's previous submission, then reset and begin its
    /// command buffer
    ///
    /// A wait that exceeds `timeout_ns` yields [`VulkanError::FenceTimeout`].
    pub fn begin_recording<D: GpuDevice>(&mut self, device: &D, timeout_ns: u64) -> VulkanResult<vk::CommandBuffer> {
        if self.state == SlotState::Recording {
            return Err(VulkanError::InvalidOperation {
                reason: "frame slot is already recording".to_string(),
            });
        }

        device
            .wait_for_fence(self.render_fence, timeout_ns)
            .map_err(|error| match error {
                VulkanError::Api(result) => VulkanError::from_wait(result, "frame fence wait"),
                other => other,
            })?;
        self.state = SlotState::Idle;

        device.reset_fence(self.render_fence)?;
        device.reset_command_buffer(self.command_buffer)?;
        device.begin_command_buffer(self.command_buffer)?;
        self.state = SlotState::Recording;
        Ok(self.command_buffer)
    }

    /// End recording and submit to the graphics queue, signaling the render
    /// fence on completion
    pub fn submit<D: GpuDevice>(&mut self, device: &D, sync: SubmitSync) -> VulkanResult<()> {
        if self.state != SlotState::Recording {
            return Err(VulkanError::InvalidOperation {
                reason: format!("cannot submit a frame slot in state {:?}", self.state),
            });
        }

        device.end_command_buffer(self.command_buffer)?;

        let present = [self.present_semaphore];
        let render = [self.render_semaphore];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let (wait_semaphores, wait_stages) = if sync.wait_present {
            (&present[..], &stages[..])
        } else {
            (&present[..0], &stages[..0])
        };
        let signal_semaphores = if sync.signal_render { &render[..] } else { &render[..0] };

        device.queue_submit(&SubmitDesc {
            command_buffer: self.command_buffer,
            wait_semaphores,
            wait_stages,
            signal_semaphores,
            fence: self.render_fence,
        })?;
        self.state = SlotState::Submitted;
        Ok(())
    }
}

/// The ring of frame slots
#[derive(Debug)]
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
}

impl FrameSlots {
    pub fn new<D: GpuDevice + 'static>(
        device: &Rc<D>,
        layouts: &DescriptorLayouts,
        descriptor_pool: vk::DescriptorPool,
        scene_buffer: &AllocatedBuffer,
        max_objects: usize,
        deletion: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let slots = (0..FRAME_OVERLAP)
            .map(|_| FrameSlot::new(device, layouts, descriptor_pool, scene_buffer, max_objects, deletion))
            .collect::<VulkanResult<Vec<_>>>()?;
        log::debug!("Created {} frame slots ({} objects each)", slots.len(), max_objects);
        Ok(Self { slots })
    }

    /// Slot for `frame_number`
    pub fn current(&self, frame_number: u64) -> &FrameSlot {
        &self.slots[slot_index(frame_number)]
    }

    pub fn current_mut(&mut self, frame_number: u64) -> &mut FrameSlot {
        &mut self.slots[slot_index(frame_number)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Block until every slot's last submission has completed
    pub fn wait_all<D: GpuDevice>(&mut self, device: &D, timeout_ns: u64) -> VulkanResult<()> {
        for slot in &mut self.slots {
            if slot.state == SlotState::Submitted {
                device
                    .wait_for_fence(slot.render_fence, timeout_ns)
                    .map_err(|error| match error {
                        VulkanError::Api(result) => VulkanError::from_wait(result, "frame fence wait"),
                        other => other,
                    })?;
                slot.state = SlotState::Idle;
            }
        }
        Ok(())
    }
}
