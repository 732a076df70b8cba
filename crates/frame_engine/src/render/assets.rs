//! Asset registry for meshes, materials and textures
//!
//! The registry is the only owner of uploaded GPU assets. Everything else
//! refers to them through copyable slotmap ids, so a render object never holds
//! a pointer into the registry. Names map to ids; a lookup miss is `None`.
//!
//! Registering under a name that is already taken replaces the record in
//! place, keeping the existing id. A replaced mesh or texture may still be in
//! use by a frame in flight, so its GPU objects are retired and destroyed with
//! the rest of the registry at teardown.

use std::collections::HashMap;
use std::path::Path;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use slotmap::{new_key_type, SlotMap};

use super::vulkan::{AllocatedBuffer, AllocatedImage, GpuDevice, VulkanError, VulkanResult};

new_key_type! {
    /// Handle to a registered mesh
    pub struct MeshId;
    /// Handle to a registered material
    pub struct MaterialId;
    /// Handle to a registered texture
    pub struct TextureId;
}

/// Vertex layout shared by every mesh pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            color,
            uv,
        }
    }
}

/// CPU-side geometry ready for upload
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    /// Single green triangle in the XY plane
    pub fn triangle() -> Self {
        let normal = [0.0, 0.0, 1.0];
        let green = [0.0, 1.0, 0.0];
        Self {
            vertices: vec![
                Vertex::new([1.0, 1.0, 0.0], normal, green, [1.0, 1.0]),
                Vertex::new([-1.0, 1.0, 0.0], normal, green, [0.0, 1.0]),
                Vertex::new([0.0, -1.0, 0.0], normal, green, [0.5, 0.0]),
            ],
            indices: None,
        }
    }

    /// Unit cube centred on the origin, four vertices per face, indexed
    pub fn cube() -> Self {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in corners {
                let position = [
                    (normal[0] + u[0] * su + v[0] * sv) * 0.5,
                    (normal[1] + u[1] * su + v[1] * sv) * 0.5,
                    (normal[2] + u[2] * su + v[2] * sv) * 0.5,
                ];
                let color = [normal[0].abs(), normal[1].abs(), normal[2].abs()];
                let uv = [(su + 1.0) * 0.5, (sv + 1.0) * 0.5];
                vertices.push(Vertex::new(position, normal, color, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            vertices,
            indices: Some(indices),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// An uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: AllocatedBuffer,
    pub index_buffer: Option<AllocatedBuffer>,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl Mesh {
    fn destroy<D: GpuDevice>(self, device: &D) {
        if let Some(index_buffer) = self.index_buffer {
            device.destroy_buffer(index_buffer);
        }
        device.destroy_buffer(self.vertex_buffer);
    }
}

/// Pipeline state an object is drawn with
///
/// The pipeline and layout are owned by whoever built them; the material
/// only refers to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    /// Set bound at index 2 when present
    pub texture_set: Option<vk::DescriptorSet>,
}

/// An uploaded, sampled texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub image: AllocatedImage,
    pub view: vk::ImageView,
}

impl Texture {
    fn destroy<D: GpuDevice>(self, device: &D) {
        device.destroy_image_view(self.view);
        device.destroy_image(self.image);
    }
}

/// Decoded RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    /// Decode an image file into RGBA8
    pub fn load<P: AsRef<Path>>(path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|error| {
                VulkanError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("failed to decode {}: {error}", path.display()),
                ))
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        log::debug!("Decoded texture {} ({width}x{height})", path.display());
        Ok(Self {
            width,
            height,
            rgba: decoded.into_raw(),
        })
    }

    /// Solid color texture
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rgba: rgba.repeat(pixels),
        }
    }
}

/// Named storage for uploaded assets
#[derive(Debug, Default)]
pub struct AssetRegistry {
    meshes: SlotMap<MeshId, Mesh>,
    mesh_names: HashMap<String, MeshId>,
    materials: SlotMap<MaterialId, Material>,
    material_names: HashMap<String, MaterialId>,
    textures: SlotMap<TextureId, Texture>,
    texture_names: HashMap<String, TextureId>,
    retired_meshes: Vec<Mesh>,
    retired_textures: Vec<Texture>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh under `name`, replacing any previous mesh of that name
    pub fn insert_mesh(&mut self, name: &str, mesh: Mesh) -> MeshId {
        if let Some(&id) = self.mesh_names.get(name) {
            if let Some(slot) = self.meshes.get_mut(id) {
                log::warn!("Mesh '{name}' re-registered; previous buffers retired");
                let previous = std::mem::replace(slot, mesh);
                self.retired_meshes.push(previous);
                return id;
            }
        }
        let id = self.meshes.insert(mesh);
        self.mesh_names.insert(name.to_string(), id);
        log::debug!("Registered mesh '{name}' ({} vertices)", mesh.vertex_count);
        id
    }

    /// Register a material under `name`, replacing any previous material of
    /// that name
    pub fn insert_material(&mut self, name: &str, material: Material) -> MaterialId {
        if let Some(&id) = self.material_names.get(name) {
            if let Some(slot) = self.materials.get_mut(id) {
                log::warn!("Material '{name}' re-registered; replacing previous entry");
                *slot = material;
                return id;
            }
        }
        let id = self.materials.insert(material);
        self.material_names.insert(name.to_string(), id);
        log::debug!("Registered material '{name}'");
        id
    }

    /// Register a texture under `name`, replacing any previous texture of
    /// that name
    pub fn insert_texture(&mut self, name: &str, texture: Texture) -> TextureId {
        if let Some(&id) = self.texture_names.get(name) {
            if let Some(slot) = self.textures.get_mut(id) {
                log::warn!("Texture '{name}' re-registered; previous image retired");
                let previous = std::mem::replace(slot, texture);
                self.retired_textures.push(previous);
                return id;
            }
        }
        let id = self.textures.insert(texture);
        self.texture_names.insert(name.to_string(), id);
        log::debug!("Registered texture '{name}'");
        id
    }

    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.mesh_names.get(name).copied()
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    pub fn texture_id(&self, name: &str) -> Option<TextureId> {
        self.texture_names.get(name).copied()
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Look up a mesh by name
    pub fn get_mesh(&self, name: &str) -> Option<&Mesh> {
        self.mesh_id(name).and_then(|id| self.mesh(id))
    }

    /// Look up a material by name
    pub fn get_material(&self, name: &str) -> Option<&Material> {
        self.material_id(name).and_then(|id| self.material(id))
    }

    pub fn get_texture(&self, name: &str) -> Option<&Texture> {
        self.texture_id(name).and_then(|id| self.texture(id))
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Destroy every GPU object the registry owns, including retired ones,
    /// and empty it
    ///
    /// The device must be idle.
    pub fn destroy_all<D: GpuDevice>(&mut self, device: &D) {
        let meshes = self.meshes.len() + self.retired_meshes.len();
        let textures = self.textures.len() + self.retired_textures.len();

        for (_, texture) in self.textures.drain() {
            texture.destroy(device);
        }
        for texture in self.retired_textures.drain(..) {
            texture.destroy(device);
        }
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy(device);
        }
        for mesh in self.retired_meshes.drain(..) {
            mesh.destroy(device);
        }
        self.materials.clear();
        self.mesh_names.clear();
        self.material_names.clear();
        self.texture_names.clear();

        log::debug!("Asset registry released {meshes} meshes and {textures} textures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::mock::MockDevice;
    use crate::render::vulkan::MemoryLocation;
    use ash::vk::Handle;

    fn fake_mesh(device: &MockDevice, vertex_count: u32, indexed: bool) -> Mesh {
        let usage = vk::BufferUsageFlags::VERTEX_BUFFER;
        let vertex_buffer = device.create_buffer(64, usage, MemoryLocation::GpuOnly).unwrap();
        let index_buffer = indexed.then(|| {
            device
                .create_buffer(64, vk::BufferUsageFlags::INDEX_BUFFER, MemoryLocation::GpuOnly)
                .unwrap()
        });
        Mesh {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count: if indexed { 6 } else { 0 },
        }
    }

    fn fake_material(raw: u64) -> Material {
        Material {
            pipeline: vk::Pipeline::from_raw(raw),
            pipeline_layout: vk::PipelineLayout::from_raw(raw + 1000),
            texture_set: None,
        }
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let registry = AssetRegistry::new();
        assert!(registry.get_material("missing").is_none());
        assert!(registry.get_mesh("missing").is_none());
        assert!(registry.get_texture("missing").is_none());
        assert!(registry.material_id("missing").is_none());
    }

    #[test]
    fn test_material_reregistration_keeps_id_and_uses_latest() {
        let mut registry = AssetRegistry::new();
        let first = registry.insert_material("defaultmesh", fake_material(1));
        let second = registry.insert_material("defaultmesh", fake_material(2));

        assert_eq!(first, second);
        assert_eq!(registry.material_count(), 1);
        assert_eq!(
            registry.get_material("defaultmesh").unwrap().pipeline,
            vk::Pipeline::from_raw(2)
        );
        assert_eq!(registry.material(first).unwrap().pipeline, vk::Pipeline::from_raw(2));
    }

    #[test]
    fn test_distinct_names_get_distinct_ids() {
        let mut registry = AssetRegistry::new();
        let a = registry.insert_material("a", fake_material(1));
        let b = registry.insert_material("b", fake_material(1));
        assert_ne!(a, b);
        assert_eq!(registry.material_id("b"), Some(b));
    }

    #[test]
    fn test_replaced_mesh_is_destroyed_at_teardown() {
        let device = MockDevice::new();
        let mut registry = AssetRegistry::new();
        let old = fake_mesh(&device, 3, false);
        let new = fake_mesh(&device, 36, true);

        let id = registry.insert_mesh("cube", old);
        assert_eq!(registry.insert_mesh("cube", new), id);
        assert_eq!(registry.get_mesh("cube").unwrap().vertex_count, 36);
        assert!(device.destroyed().is_empty());

        registry.destroy_all(&device);
        let destroyed: Vec<u64> = device.destroyed().into_iter().map(|(_, raw)| raw).collect();
        assert_eq!(destroyed.len(), 3);
        assert!(destroyed.contains(&old.vertex_buffer.buffer.as_raw()));
        assert!(destroyed.contains(&new.vertex_buffer.buffer.as_raw()));
        assert!(destroyed.contains(&new.index_buffer.unwrap().buffer.as_raw()));
        assert!(registry.get_mesh("cube").is_none());
        assert_eq!(registry.mesh_count(), 0);
    }

    #[test]
    fn test_stale_id_after_teardown_is_none() {
        let device = MockDevice::new();
        let mut registry = AssetRegistry::new();
        let id = registry.insert_mesh("tri", fake_mesh(&device, 3, false));
        registry.destroy_all(&device);
        assert!(registry.mesh(id).is_none());
    }

    #[test]
    fn test_texture_teardown_destroys_view_before_image() {
        let device = MockDevice::new();
        let mut registry = AssetRegistry::new();
        let image = device
            .create_image(&crate::render::vulkan::ImageDesc {
                format: vk::Format::R8G8B8A8_SRGB,
                extent: vk::Extent3D { width: 1, height: 1, depth: 1 },
                usage: vk::ImageUsageFlags::SAMPLED,
                location: MemoryLocation::GpuOnly,
            })
            .unwrap();
        let view = device.create_image_view(&image, vk::ImageAspectFlags::COLOR).unwrap();
        registry.insert_texture("empire_diffuse", Texture { image, view });

        registry.destroy_all(&device);
        assert_eq!(
            device.destroyed(),
            vec![("image_view", view.as_raw()), ("image", image.image.as_raw())]
        );
    }

    #[test]
    fn test_triangle_and_cube_geometry() {
        let triangle = MeshData::triangle();
        assert_eq!(triangle.vertices.len(), 3);
        assert!(triangle.indices.is_none());

        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        let indices = cube.indices.as_ref().unwrap();
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
        for vertex in &cube.vertices {
            assert!(vertex.position.iter().all(|c| c.abs() <= 0.5 + f32::EPSILON));
        }
    }

    #[test]
    fn test_solid_pixels_have_expected_size() {
        let pixels = TexturePixels::solid(4, 2, [10, 20, 30, 255]);
        assert_eq!(pixels.rgba.len(), 4 * 2 * 4);
        assert_eq!(&pixels.rgba[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_load_missing_texture_is_an_error() {
        let result = TexturePixels::load("definitely/not/here.png");
        assert!(matches!(result, Err(VulkanError::Io(_))));
    }
}
