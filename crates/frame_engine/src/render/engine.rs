//! Engine facade
//!
//! Owns the device handle, frame slots, upload context, asset registry and
//! the main deletion queue, and runs the per-frame sequence:
//!
//! 1. wait on the slot's fence and begin its command buffer
//! 2. acquire a framebuffer from the render target
//! 3. begin the render pass, record draws, end the render pass
//! 4. submit gated by the slot's fence (and semaphores if the target presents)
//! 5. present and advance the frame number
//!
//! Teardown order is fixed: wait for every slot, release registry-owned GPU
//! objects, then flush the main deletion queue.

use std::mem::size_of;
use std::path::Path;
use std::rc::Rc;

use ash::vk;

use super::assets::{AssetRegistry, Material, MaterialId, Mesh, MeshData, MeshId, Texture, TextureId, TexturePixels};
use super::deletion_queue::DeletionQueue;
use super::descriptors::{create_descriptor_pool, DescriptorLayouts};
use super::draw::{draw_objects, pad_uniform_buffer_size, DrawContext, DrawStats, RenderObject};
use super::frame::{slot_index, FrameSlots, FRAME_OVERLAP};
use super::gpu_data::{Camera, GpuSceneData};
use super::pipeline::{
    create_mesh_pipeline_layout, create_textured_pipeline_layout, load_shader_module, PipelineBuilder,
    VertexInputDescription,
};
use super::target::RenderTarget;
use super::upload::{upload_buffer, upload_image, UploadContext};
use super::vulkan::{fatal, AllocatedBuffer, GpuDevice, MemoryLocation, VulkanError, VulkanResult};
use crate::config::RendererConfig;

/// Format textures are uploaded in
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Frame renderer over a device `D` drawing into a target `T`
pub struct Engine<D: GpuDevice + 'static, T: RenderTarget> {
    device: Rc<D>,
    config: RendererConfig,
    target: T,
    frames: FrameSlots,
    upload: UploadContext,
    layouts: DescriptorLayouts,
    descriptor_pool: vk::DescriptorPool,
    scene_buffer: AllocatedBuffer,
    texture_sampler: vk::Sampler,
    mesh_pipeline_layout: vk::PipelineLayout,
    textured_pipeline_layout: vk::PipelineLayout,
    assets: AssetRegistry,
    main_deletion: DeletionQueue,
    camera: Camera,
    scene_parameters: GpuSceneData,
    frame_number: u64,
    cleaned_up: bool,
}

/// Long-lived GPU objects created during [`Engine::init`]
struct EngineResources<T> {
    target: T,
    frames: FrameSlots,
    upload: UploadContext,
    layouts: DescriptorLayouts,
    descriptor_pool: vk::DescriptorPool,
    scene_buffer: AllocatedBuffer,
    texture_sampler: vk::Sampler,
    mesh_pipeline_layout: vk::PipelineLayout,
    textured_pipeline_layout: vk::PipelineLayout,
}

impl<D: GpuDevice + 'static, T: RenderTarget> Engine<D, T> {
    /// Create every long-lived GPU object
    ///
    /// `create_target` builds the render target and registers its cleanup
    /// on the queue it is given, which the engine flushes at teardown. If any
    /// step fails, everything created before it is destroyed again, so a
    /// caller may retry with a smaller configuration.
    pub fn init<F>(device: Rc<D>, config: RendererConfig, create_target: F) -> VulkanResult<Self>
    where
        F: FnOnce(&Rc<D>, &mut DeletionQueue) -> VulkanResult<T>,
    {
        log::info!(
            "Initializing engine '{}' on {}",
            config.application_name,
            device.properties().device_name
        );
        let mut main_deletion = DeletionQueue::new();

        let resources = match Self::create_resources(&device, &config, create_target, &mut main_deletion) {
            Ok(resources) => resources,
            Err(error) => {
                log::error!(
                    "Engine initialization failed: {error}; releasing {} partial setup actions",
                    main_deletion.len()
                );
                main_deletion.flush();
                return Err(error);
            }
        };

        let mut camera = Camera::default();
        camera.set_aspect_ratio(config.aspect_ratio());

        log::info!("Engine initialized ({} deferred deletions queued)", main_deletion.len());
        Ok(Self {
            device,
            config,
            target: resources.target,
            frames: resources.frames,
            upload: resources.upload,
            layouts: resources.layouts,
            descriptor_pool: resources.descriptor_pool,
            scene_buffer: resources.scene_buffer,
            texture_sampler: resources.texture_sampler,
            mesh_pipeline_layout: resources.mesh_pipeline_layout,
            textured_pipeline_layout: resources.textured_pipeline_layout,
            assets: AssetRegistry::new(),
            main_deletion,
            camera,
            scene_parameters: GpuSceneData::default(),
            frame_number: 0,
            cleaned_up: false,
        })
    }

    fn create_resources<F>(
        device: &Rc<D>,
        config: &RendererConfig,
        create_target: F,
        main_deletion: &mut DeletionQueue,
    ) -> VulkanResult<EngineResources<T>>
    where
        F: FnOnce(&Rc<D>, &mut DeletionQueue) -> VulkanResult<T>,
    {
        let target = create_target(device, main_deletion)?;
        let layouts = DescriptorLayouts::create(device, main_deletion)?;
        let descriptor_pool = create_descriptor_pool(device, main_deletion)?;

        let scene_stride = pad_uniform_buffer_size(
            size_of::<GpuSceneData>() as vk::DeviceSize,
            device.min_uniform_buffer_offset_alignment(),
        );
        let scene_buffer = device.create_buffer(
            scene_stride * FRAME_OVERLAP as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        {
            let owner = Rc::clone(device);
            main_deletion.push(move || owner.destroy_buffer(scene_buffer));
        }
        log::debug!(
            "Scene buffer: {} slots of {} bytes (min alignment {})",
            FRAME_OVERLAP,
            scene_stride,
            device.min_uniform_buffer_offset_alignment()
        );

        let frames = FrameSlots::new(
            device,
            &layouts,
            descriptor_pool,
            &scene_buffer,
            config.max_objects,
            main_deletion,
        )?;
        let upload = UploadContext::new(device, config.upload_timeout_ns, main_deletion)?;

        let texture_sampler = device.create_sampler(vk::Filter::NEAREST)?;
        {
            let owner = Rc::clone(device);
            main_deletion.push(move || owner.destroy_sampler(texture_sampler));
        }
        let mesh_pipeline_layout = create_mesh_pipeline_layout(device.as_ref(), &layouts)?;
        {
            let owner = Rc::clone(device);
            main_deletion.push(move || owner.destroy_pipeline_layout(mesh_pipeline_layout));
        }
        let textured_pipeline_layout = create_textured_pipeline_layout(device.as_ref(), &layouts)?;
        {
            let owner = Rc::clone(device);
            main_deletion.push(move || owner.destroy_pipeline_layout(textured_pipeline_layout));
        }

        Ok(EngineResources {
            target,
            frames,
            upload,
            layouts,
            descriptor_pool,
            scene_buffer,
            texture_sampler,
            mesh_pipeline_layout,
            textured_pipeline_layout,
        })
    }

    pub fn device(&self) -> &Rc<D> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    /// Frames completed so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn scene_parameters_mut(&mut self) -> &mut GpuSceneData {
        &mut self.scene_parameters
    }

    /// Pipeline layout for untextured meshes (sets 0 and 1)
    pub fn mesh_pipeline_layout(&self) -> vk::PipelineLayout {
        self.mesh_pipeline_layout
    }

    /// Pipeline layout for textured meshes (sets 0, 1 and 2)
    pub fn textured_pipeline_layout(&self) -> vk::PipelineLayout {
        self.textured_pipeline_layout
    }

    /// Load a SPIR-V module; release it with
    /// [`release_shader_module`](Self::release_shader_module) once the
    /// pipelines using it are built
    pub fn load_shader_module<P: AsRef<Path>>(&self, path: P) -> VulkanResult<vk::ShaderModule> {
        load_shader_module(self.device.as_ref(), path)
    }

    pub fn release_shader_module(&self, module: vk::ShaderModule) {
        self.device.destroy_shader_module(module);
    }

    /// Builder preset for `layout` with the engine's vertex format and the
    /// target's extent
    pub fn pipeline_builder(&self, layout: vk::PipelineLayout) -> PipelineBuilder {
        PipelineBuilder::new(layout, self.target.extent()).with_vertex_input(VertexInputDescription::for_vertex())
    }

    /// Compile a pipeline for the target's render pass; it lives until
    /// teardown
    pub fn build_pipeline(&mut self, builder: &PipelineBuilder) -> VulkanResult<vk::Pipeline> {
        let pipeline = builder.build(self.device.as_ref(), self.target.render_pass())?;
        let owner = Rc::clone(&self.device);
        self.main_deletion.push(move || owner.destroy_pipeline(pipeline));
        Ok(pipeline)
    }

    /// Upload vertex (and index) data and register the mesh under `name`
    pub fn upload_mesh(&mut self, name: &str, data: &MeshData) -> VulkanResult<MeshId> {
        if data.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("mesh '{name}' has no vertices"),
            });
        }

        let vertex_buffer = upload_buffer(
            &self.device,
            &self.upload,
            bytemuck::cast_slice(&data.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = match data.indices.as_deref() {
            Some(indices) if !indices.is_empty() => {
                match upload_buffer(
                    &self.device,
                    &self.upload,
                    bytemuck::cast_slice(indices),
                    vk::BufferUsageFlags::INDEX_BUFFER,
                ) {
                    Ok(buffer) => Some(buffer),
                    Err(error) => {
                        self.device.destroy_buffer(vertex_buffer);
                        return Err(error);
                    }
                }
            }
            _ => None,
        };

        let mesh = Mesh {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.as_ref().map_or(0, |indices| indices.len() as u32),
        };
        Ok(self.assets.insert_mesh(name, mesh))
    }

    /// Upload RGBA8 pixels and register the texture under `name`
    pub fn upload_texture(&mut self, name: &str, pixels: &TexturePixels) -> VulkanResult<TextureId> {
        let image = upload_image(
            &self.device,
            &self.upload,
            &pixels.rgba,
            pixels.width,
            pixels.height,
            TEXTURE_FORMAT,
        )?;
        let view = match self.device.create_image_view(&image, vk::ImageAspectFlags::COLOR) {
            Ok(view) => view,
            Err(error) => {
                self.device.destroy_image(image);
                return Err(error);
            }
        };
        Ok(self.assets.insert_texture(name, Texture { image, view }))
    }

    /// Register a material under `name`, replacing any previous one
    pub fn create_material(&mut self, name: &str, pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> MaterialId {
        self.assets.insert_material(
            name,
            Material {
                pipeline,
                pipeline_layout: layout,
                texture_set: None,
            },
        )
    }

    pub fn get_material(&self, name: &str) -> Option<&Material> {
        self.assets.get_material(name)
    }

    pub fn get_mesh(&self, name: &str) -> Option<&Mesh> {
        self.assets.get_mesh(name)
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.assets.material_id(name)
    }

    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.assets.mesh_id(name)
    }

    /// Give a material a descriptor set sampling `texture` at set 2
    ///
    /// Meant for setup, before the material is drawn. A material keeps one
    /// texture set; binding again points that set at the new texture.
    pub fn bind_texture(&mut self, material: MaterialId, texture: TextureId) -> VulkanResult<()> {
        let view = self
            .assets
            .texture(texture)
            .map(|texture| texture.view)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "bind_texture with an unregistered texture".to_string(),
            })?;
        if self.assets.material(material).is_none() {
            return Err(VulkanError::InvalidOperation {
                reason: "bind_texture with an unregistered material".to_string(),
            });
        }

        let set = match self.assets.material(material).and_then(|entry| entry.texture_set) {
            // Rebinding rewrites the set in place instead of draining the pool
            Some(set) => set,
            None => {
                let set = self
                    .device
                    .allocate_descriptor_set(self.descriptor_pool, self.layouts.single_texture)?;
                if let Some(entry) = self.assets.material_mut(material) {
                    entry.texture_set = Some(set);
                }
                set
            }
        };
        self.device.write_image_descriptor(set, 0, self.texture_sampler, view);
        Ok(())
    }

    /// Render one frame
    ///
    /// A fence timeout, device loss or any other device failure here is
    /// fatal: it is logged and the process aborts.
    ///
    /// # Panics
    ///
    /// See [`draw_objects`].
    pub fn draw(&mut self, objects: &[RenderObject]) -> DrawStats {
        let result = self.try_draw(objects);
        fatal::check(result, "draw")
    }

    fn try_draw(&mut self, objects: &[RenderObject]) -> VulkanResult<DrawStats> {
        let frame_number = self.frame_number;
        let index = slot_index(frame_number);
        let device = self.device.as_ref();

        let command_buffer = self
            .frames
            .current_mut(frame_number)
            .begin_recording(device, self.config.fence_timeout_ns)?;

        let slot = self.frames.current(frame_number);
        let acquired = self.target.acquire(slot.present_semaphore)?;
        let clear_values = self.target.clear_values(self.config.clear_color);
        device.cmd_begin_render_pass(
            command_buffer,
            self.target.render_pass(),
            acquired.framebuffer,
            self.target.extent(),
            &clear_values,
        );

        let camera = self.camera.gpu_data();
        let ctx = DrawContext {
            command_buffer,
            slot,
            slot_index: index,
            scene_buffer: &self.scene_buffer,
            camera: &camera,
            scene: &self.scene_parameters,
            assets: &self.assets,
        };
        let stats = draw_objects(device, &ctx, objects)?;
        device.cmd_end_render_pass(command_buffer);

        let slot = self.frames.current_mut(frame_number);
        slot.submit(device, acquired.sync)?;
        let render_semaphore = slot.render_semaphore;
        self.target.present(&acquired, render_semaphore)?;

        if frame_number % 120 == 0 {
            log::debug!("Frame {frame_number} (slot {index}): {stats:?}");
        } else {
            log::trace!("Frame {frame_number} (slot {index}): {} draws", stats.draw_calls);
        }
        self.frame_number += 1;
        Ok(stats)
    }

    /// Wait for the GPU and destroy everything the engine created
    ///
    /// Idempotent; also runs on drop.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        let device = self.device.as_ref();
        fatal::check(
            self.frames.wait_all(device, self.config.fence_timeout_ns),
            "teardown fence wait",
        );
        fatal::check(device.wait_idle(), "teardown device wait");

        log::debug!(
            "Releasing {} meshes, {} materials and {} textures",
            self.assets.mesh_count(),
            self.assets.material_count(),
            self.assets.texture_count()
        );
        self.assets.destroy_all(device);
        self.main_deletion.flush();
        self.cleaned_up = true;
        log::info!("Engine shut down after {} frames", self.frame_number);
    }
}

impl<D: GpuDevice + 'static, T: RenderTarget> Drop for Engine<D, T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::target::OffscreenTarget;
    use crate::render::vulkan::mock::{MockDevice, MockEvent};

    type TestEngine = Engine<MockDevice, OffscreenTarget>;

    fn engine() -> (Rc<MockDevice>, TestEngine) {
        let device = Rc::new(MockDevice::new());
        let config = RendererConfig::new("engine test")
            .with_render_extent(64, 64)
            .with_max_objects(32);
        let extent = vk::Extent2D { width: 64, height: 64 };
        let engine = Engine::init(Rc::clone(&device), config, |device, deletion| {
            OffscreenTarget::new(device, extent, deletion)
        })
        .unwrap();
        (device, engine)
    }

    fn scene(engine: &mut TestEngine) -> Vec<RenderObject> {
        let mesh = engine.upload_mesh("triangle", &MeshData::triangle()).unwrap();
        let layout = engine.mesh_pipeline_layout();
        let builder = engine
            .pipeline_builder(layout)
            .with_shader(vk::ShaderStageFlags::VERTEX, vk::Handle::from_raw(900))
            .with_shader(vk::ShaderStageFlags::FRAGMENT, vk::Handle::from_raw(901));
        let pipeline = engine.build_pipeline(&builder).unwrap();
        let material = engine.create_material("defaultmesh", pipeline, layout);
        (0..3)
            .map(|i| RenderObject {
                mesh,
                material,
                transform: Mat4::new_translation(&Vec3::new(i as f32, 0.0, 0.0)),
            })
            .collect()
    }

    #[test]
    fn test_frames_alternate_slot_fences() {
        let (device, mut engine) = engine();
        let objects = scene(&mut engine);
        device.clear_events();

        for _ in 0..4 {
            let stats = engine.draw(&objects);
            assert_eq!(stats.draw_calls, 3);
            assert_eq!(stats.pipeline_binds, 1);
        }
        assert_eq!(engine.frame_number(), 4);

        let fences: Vec<vk::Fence> = device
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Submit { fence, .. } => Some(fence),
                _ => None,
            })
            .collect();
        assert_eq!(fences.len(), 4);
        assert_ne!(fences[0], fences[1]);
        assert_eq!(fences[0], fences[2]);
        assert_eq!(fences[1], fences[3]);
        assert_eq!(engine.target().frames_rendered(), 4);
    }

    #[test]
    fn test_frame_waits_before_recording() {
        let (device, mut engine) = engine();
        let objects = scene(&mut engine);
        device.clear_events();
        engine.draw(&objects);

        let events = device.events();
        assert!(matches!(events[0], MockEvent::WaitFence(_)));
        let begin_pass = events
            .iter()
            .position(|e| matches!(e, MockEvent::BeginRenderPass { .. }))
            .unwrap();
        let first_bind = events.iter().position(|e| matches!(e, MockEvent::BindPipeline(_))).unwrap();
        let end_pass = events.iter().position(|e| *e == MockEvent::EndRenderPass).unwrap();
        let submit = events.iter().position(|e| matches!(e, MockEvent::Submit { .. })).unwrap();
        assert!(begin_pass < first_bind && first_bind < end_pass && end_pass < submit);
    }

    #[test]
    fn test_fence_timeout_surfaces_from_try_draw() {
        let (device, mut engine) = engine();
        let objects = scene(&mut engine);
        device.fail_fence_waits(vk::Result::TIMEOUT);
        let result = engine.try_draw(&objects);
        assert!(matches!(result, Err(VulkanError::FenceTimeout { .. })));
        assert_eq!(engine.frame_number(), 0);

        // Teardown would abort on the same timeout
        engine.cleaned_up = true;
    }

    #[test]
    fn test_mesh_reupload_keeps_id() {
        let (_device, mut engine) = engine();
        let first = engine.upload_mesh("cube", &MeshData::triangle()).unwrap();
        let second = engine.upload_mesh("cube", &MeshData::cube()).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.get_mesh("cube").unwrap().index_count, 36);
        assert!(engine.get_mesh("sphere").is_none());
        assert!(engine.get_material("missing").is_none());
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let (_device, mut engine) = engine();
        let result = engine.upload_mesh("empty", &MeshData::default());
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
    }

    #[test]
    fn test_rejected_pipeline_is_recoverable() {
        let (device, mut engine) = engine();
        let layout = engine.mesh_pipeline_layout();
        let builder = engine
            .pipeline_builder(layout)
            .with_shader(vk::ShaderStageFlags::VERTEX, vk::Handle::from_raw(900));

        device.reject_pipelines(true);
        assert!(matches!(
            engine.build_pipeline(&builder),
            Err(VulkanError::PipelineCompilation { .. })
        ));
        device.reject_pipelines(false);
        assert!(engine.build_pipeline(&builder).is_ok());
    }

    #[test]
    fn test_bind_texture_sets_material_descriptor() {
        let (device, mut engine) = engine();
        let texture = engine
            .upload_texture("empire_diffuse", &TexturePixels::solid(2, 2, [255, 0, 0, 255]))
            .unwrap();
        let layout = engine.textured_pipeline_layout();
        let material = engine.create_material("texturedmesh", vk::Handle::from_raw(77), layout);
        assert!(engine.get_material("texturedmesh").unwrap().texture_set.is_none());

        engine.bind_texture(material, texture).unwrap();
        assert_eq!(engine.assets().texture_count(), 1);
        let set = engine.get_material("texturedmesh").unwrap().texture_set.unwrap();
        let view = engine.assets().texture(texture).unwrap().view;
        assert!(device
            .events()
            .contains(&MockEvent::WriteImageDescriptor { set, view }));
    }

    #[test]
    fn test_rebinding_texture_reuses_the_set() {
        let (device, mut engine) = engine();
        let first = engine
            .upload_texture("diffuse_a", &TexturePixels::solid(2, 2, [255, 0, 0, 255]))
            .unwrap();
        let second = engine
            .upload_texture("diffuse_b", &TexturePixels::solid(2, 2, [0, 255, 0, 255]))
            .unwrap();
        let layout = engine.textured_pipeline_layout();
        let material = engine.create_material("texturedmesh", vk::Handle::from_raw(77), layout);

        engine.bind_texture(material, first).unwrap();
        let set = engine.get_material("texturedmesh").unwrap().texture_set.unwrap();
        engine.bind_texture(material, second).unwrap();
        assert_eq!(engine.get_material("texturedmesh").unwrap().texture_set, Some(set));

        let view = engine.assets().texture(second).unwrap().view;
        let writes: Vec<MockEvent> = device
            .events()
            .into_iter()
            .filter(|e| matches!(e, MockEvent::WriteImageDescriptor { .. }))
            .collect();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], MockEvent::WriteImageDescriptor { set, view });
    }

    #[test]
    fn test_failed_init_releases_partial_setup() {
        let device = Rc::new(MockDevice::new());
        // Default capacity needs 640 KB per object buffer
        device.fail_allocations_above(100_000);
        let config = RendererConfig::new("small device").with_render_extent(64, 64);
        let extent = vk::Extent2D { width: 64, height: 64 };

        let result = TestEngine::init(Rc::clone(&device), config.clone(), |device, deletion| {
            OffscreenTarget::new(device, extent, deletion)
        });
        assert!(matches!(result, Err(VulkanError::OutOfMemory { .. })));

        let created = device.count(|e| matches!(e, MockEvent::CreateBuffer { .. }));
        let destroyed = device.destroyed();
        assert!(created > 0);
        assert_eq!(destroyed.iter().filter(|(kind, _)| *kind == "buffer").count(), created);
        for kind in ["render_pass", "framebuffer", "image", "descriptor_pool", "descriptor_set_layout", "fence"] {
            assert!(destroyed.iter().any(|(destroyed_kind, _)| *destroyed_kind == kind), "{kind} leaked");
        }

        let retry = TestEngine::init(Rc::clone(&device), config.with_max_objects(1_000), |device, deletion| {
            OffscreenTarget::new(device, extent, deletion)
        });
        assert!(retry.is_ok());
    }

    #[test]
    fn test_bind_unknown_texture_fails() {
        let (_device, mut engine) = engine();
        let layout = engine.textured_pipeline_layout();
        let material = engine.create_material("texturedmesh", vk::Handle::from_raw(77), layout);
        let result = engine.bind_texture(material, TextureId::default());
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
    }

    #[test]
    fn test_cleanup_order_and_idempotence() {
        let (device, mut engine) = engine();
        let objects = scene(&mut engine);
        engine.draw(&objects);
        let vertex_buffer = engine.get_mesh("triangle").unwrap().vertex_buffer.buffer;
        device.clear_events();

        engine.cleanup();
        let events = device.events();
        let wait_idle = events.iter().position(|e| *e == MockEvent::WaitIdle).unwrap();
        let mesh_destroyed = events
            .iter()
            .position(|e| *e == MockEvent::Destroy("buffer", vk::Handle::as_raw(vertex_buffer)))
            .unwrap();
        let first_pipeline_destroyed = events
            .iter()
            .position(|e| matches!(e, MockEvent::Destroy("pipeline", _)))
            .unwrap();
        assert!(matches!(events[0], MockEvent::WaitFence(_)));
        assert!(wait_idle < mesh_destroyed);
        assert!(mesh_destroyed < first_pipeline_destroyed);

        let destroyed = device.destroyed().len();
        engine.cleanup();
        drop(engine);
        assert_eq!(device.destroyed().len(), destroyed);
    }

    #[test]
    fn test_scene_parameters_reach_the_gpu() {
        let (device, mut engine) = engine();
        let objects = scene(&mut engine);
        engine.scene_parameters_mut().ambient_color = [0.5, 0.25, 0.0, 1.0];
        engine.camera_mut().set_aspect_ratio(2.0);
        device.clear_events();
        engine.draw(&objects);

        let expected = bytemuck::bytes_of(&engine.scene_parameters).to_vec();
        assert!(device
            .events()
            .iter()
            .any(|e| matches!(e, MockEvent::WriteBuffer { offset: 0, data, .. } if *data == expected)));
    }
}
