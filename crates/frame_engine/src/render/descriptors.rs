//! Descriptor set layouts and the engine's descriptor pool
//!
//! Set 0 (global): camera uniform buffer at binding 0, scene parameters as a
//! dynamic uniform buffer at binding 1. Set 1 (object): storage buffer of
//! per-object data. Set 2 (texture): one combined image sampler.

use std::rc::Rc;

use ash::vk;

use super::deletion_queue::DeletionQueue;
use super::vulkan::{GpuDevice, VulkanResult};

/// Upper bound on sets allocated from the engine pool (frame slots and
/// texture bindings)
pub const MAX_DESCRIPTOR_SETS: u32 = 64;

fn layout_binding(
    binding: u32,
    descriptor_type: vk::DescriptorType,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
    vk::DescriptorSetLayoutBinding::builder()
        .binding(binding)
        .descriptor_type(descriptor_type)
        .descriptor_count(1)
        .stage_flags(stages)
        .build()
}

/// The three set layouts every pipeline layout is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayouts {
    pub global: vk::DescriptorSetLayout,
    pub object: vk::DescriptorSetLayout,
    pub single_texture: vk::DescriptorSetLayout,
}

impl DescriptorLayouts {
    /// Create the layouts and queue their destruction
    pub fn create<D: GpuDevice + 'static>(device: &Rc<D>, deletion: &mut DeletionQueue) -> VulkanResult<Self> {
        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let global = device.create_descriptor_set_layout(&[
            layout_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
            layout_binding(1, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, stages),
        ])?;
        let object = device.create_descriptor_set_layout(&[layout_binding(
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::ShaderStageFlags::VERTEX,
        )])?;
        let single_texture = device.create_descriptor_set_layout(&[layout_binding(
            0,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )])?;

        let owner = Rc::clone(device);
        deletion.push(move || {
            owner.destroy_descriptor_set_layout(single_texture);
            owner.destroy_descriptor_set_layout(object);
            owner.destroy_descriptor_set_layout(global);
        });

        Ok(Self {
            global,
            object,
            single_texture,
        })
    }
}

/// Create the descriptor pool shared by frame slots and textured materials
pub fn create_descriptor_pool<D: GpuDevice + 'static>(
    device: &Rc<D>,
    deletion: &mut DeletionQueue,
) -> VulkanResult<vk::DescriptorPool> {
    let sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 16,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: 16,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 16,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: MAX_DESCRIPTOR_SETS,
        },
    ];
    let pool = device.create_descriptor_pool(MAX_DESCRIPTOR_SETS, &sizes)?;

    let owner = Rc::clone(device);
    deletion.push(move || owner.destroy_descriptor_pool(pool));
    Ok(pool)
}
