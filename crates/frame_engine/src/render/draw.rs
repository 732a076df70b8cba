//! Draw submission
//!
//! Records one frame's worth of draws into a slot's command buffer. Uniform
//! data is written first (camera, this slot's scene region, every object
//! transform in one pass), then objects are drawn in input order while
//! re-binding pipeline state only when the material changes and vertex data
//! only when the mesh changes. Sorting objects by material and mesh is the
//! caller's job.

use std::mem::size_of;

use ash::vk;

use super::assets::{AssetRegistry, MaterialId, MeshId};
use super::frame::FrameSlot;
use super::gpu_data::{GpuCameraData, GpuObjectData, GpuSceneData, MeshPushConstants};
use super::vulkan::{AllocatedBuffer, GpuDevice, VulkanResult};
use crate::foundation::math::{mat4_to_cols, Mat4};

/// Round `original_size` up to a multiple of `min_alignment`
///
/// Every stride into a buffer accessed through dynamic offsets must use the
/// padded size. An alignment of zero means the device imposes none.
pub fn pad_uniform_buffer_size(original_size: vk::DeviceSize, min_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_alignment == 0 {
        return original_size;
    }
    original_size.div_ceil(min_alignment) * min_alignment
}

/// A mesh drawn with a material at a transform
///
/// Holds ids only; the registry owns the assets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
}

/// Counters for one recorded frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub objects: usize,
    pub pipeline_binds: usize,
    pub descriptor_binds: usize,
    pub vertex_buffer_binds: usize,
    pub draw_calls: usize,
}

/// Everything [`draw_objects`] reads for the current frame
pub struct DrawContext<'a> {
    pub command_buffer: vk::CommandBuffer,
    pub slot: &'a FrameSlot,
    pub slot_index: usize,
    /// Scene buffer shared by all slots, one padded region per slot
    pub scene_buffer: &'a AllocatedBuffer,
    pub camera: &'a GpuCameraData,
    pub scene: &'a GpuSceneData,
    pub assets: &'a AssetRegistry,
}

/// Byte offset of a slot's region in the shared scene buffer
pub fn scene_buffer_offset<D: GpuDevice>(device: &D, slot_index: usize) -> vk::DeviceSize {
    let stride = pad_uniform_buffer_size(
        size_of::<GpuSceneData>() as vk::DeviceSize,
        device.min_uniform_buffer_offset_alignment(),
    );
    stride * slot_index as vk::DeviceSize
}

/// Record draws for `objects` into the context's command buffer
///
/// The command buffer must be recording inside the target render pass.
///
/// # Panics
///
/// Panics if `objects` exceeds the slot's object buffer capacity or refers to
/// a mesh or material that is not registered. Both are caller bugs and a
/// partly recorded command buffer cannot be submitted safely.
pub fn draw_objects<D: GpuDevice>(
    device: &D,
    ctx: &DrawContext<'_>,
    objects: &[RenderObject],
) -> VulkanResult<DrawStats> {
    let capacity = ctx.slot.object_capacity();
    assert!(
        objects.len() <= capacity,
        "{} render objects exceed the object buffer capacity of {capacity}",
        objects.len()
    );

    device.write_buffer(&ctx.slot.camera_buffer, 0, bytemuck::bytes_of(ctx.camera))?;

    let scene_offset = scene_buffer_offset(device, ctx.slot_index);
    device.write_buffer(ctx.scene_buffer, scene_offset, bytemuck::bytes_of(ctx.scene))?;

    if !objects.is_empty() {
        let object_data: Vec<GpuObjectData> = objects
            .iter()
            .map(|object| GpuObjectData::from_transform(&object.transform))
            .collect();
        device.write_buffer(&ctx.slot.object_buffer, 0, bytemuck::cast_slice(&object_data))?;
    }

    let mut stats = DrawStats {
        objects: objects.len(),
        ..DrawStats::default()
    };
    let mut last_mesh: Option<MeshId> = None;
    let mut last_material: Option<MaterialId> = None;

    for (index, object) in objects.iter().enumerate() {
        let material = ctx
            .assets
            .material(object.material)
            .unwrap_or_else(|| panic!("render object {index} uses an unregistered material"));
        let mesh = ctx
            .assets
            .mesh(object.mesh)
            .unwrap_or_else(|| panic!("render object {index} uses an unregistered mesh"));

        if last_material != Some(object.material) {
            device.cmd_bind_pipeline(ctx.command_buffer, material.pipeline);
            stats.pipeline_binds += 1;

            device.cmd_bind_descriptor_sets(
                ctx.command_buffer,
                material.pipeline_layout,
                0,
                &[ctx.slot.global_descriptor],
                &[scene_offset as u32],
            );
            device.cmd_bind_descriptor_sets(
                ctx.command_buffer,
                material.pipeline_layout,
                1,
                &[ctx.slot.object_descriptor],
                &[],
            );
            stats.descriptor_binds += 2;

            if let Some(texture_set) = material.texture_set {
                device.cmd_bind_descriptor_sets(ctx.command_buffer, material.pipeline_layout, 2, &[texture_set], &[]);
                stats.descriptor_binds += 1;
            }
            last_material = Some(object.material);
        }

        let constants = MeshPushConstants {
            data: [0.0; 4],
            render_matrix: mat4_to_cols(&object.transform),
        };
        device.cmd_push_constants(
            ctx.command_buffer,
            material.pipeline_layout,
            vk::ShaderStageFlags::VERTEX,
            bytemuck::bytes_of(&constants),
        );

        if last_mesh != Some(object.mesh) {
            device.cmd_bind_vertex_buffer(ctx.command_buffer, mesh.vertex_buffer.buffer);
            if let Some(index_buffer) = &mesh.index_buffer {
                device.cmd_bind_index_buffer(ctx.command_buffer, index_buffer.buffer);
            }
            stats.vertex_buffer_binds += 1;
            last_mesh = Some(object.mesh);
        }

        // first_instance carries the object index into the storage buffer
        if mesh.index_buffer.is_some() {
            device.cmd_draw_indexed(ctx.command_buffer, mesh.index_count, 1, 0, 0, index as u32);
        } else {
            device.cmd_draw(ctx.command_buffer, mesh.vertex_count, 1, 0, index as u32);
        }
        stats.draw_calls += 1;
    }

    Ok(stats)
}
