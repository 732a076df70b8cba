//! CPU mirrors of shader-visible data
//!
//! All structs are `#[repr(C)]` and `Pod` so they can be written into mapped
//! buffers with `bytemuck::bytes_of` / `cast_slice`. Matrices are stored
//! column-major, vectors as `[f32; 4]` to match std140/std430 vec4 layout.

use bytemuck::{Pod, Zeroable};
use nalgebra::Point3;

use crate::foundation::math::{mat4_to_cols, vec4_to_array, Mat4, Vec3, Vec4};

/// Camera uniform buffer contents (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuCameraData {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub viewproj: [[f32; 4]; 4],
}

/// Scene parameters (set 0, binding 1, dynamic offset per frame slot)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    pub fog_color: [f32; 4],
    /// x = min, y = max, zw unused
    pub fog_distances: [f32; 4],
    pub ambient_color: [f32; 4],
    /// w = sun power
    pub sunlight_direction: [f32; 4],
    pub sunlight_color: [f32; 4],
}

impl Default for GpuSceneData {
    fn default() -> Self {
        Self {
            fog_color: [0.0; 4],
            fog_distances: [0.0; 4],
            ambient_color: [0.1, 0.1, 0.1, 1.0],
            sunlight_direction: [0.0, -1.0, 0.0, 1.0],
            sunlight_color: [1.0; 4],
        }
    }
}

impl GpuSceneData {
    pub fn set_ambient_color(&mut self, color: Vec4) {
        self.ambient_color = vec4_to_array(&color);
    }
}

/// One entry of the per-frame object storage buffer (set 1, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObjectData {
    pub model: [[f32; 4]; 4],
}

impl GpuObjectData {
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            model: mat4_to_cols(transform),
        }
    }
}

/// Push constant block shared by the mesh pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshPushConstants {
    pub data: [f32; 4],
    pub render_matrix: [[f32; 4]; 4],
}

/// Perspective camera producing [`GpuCameraData`]
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Perspective camera looking at the origin
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::y(),
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        } else {
            log::warn!("Ignoring invalid camera aspect ratio {aspect}");
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.target),
            &self.up,
        )
    }

    /// Projection with Y flipped for Vulkan clip space
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::new_perspective(self.aspect, self.fov, self.near, self.far);
        proj[(1, 1)] *= -1.0;
        proj
    }

    pub fn gpu_data(&self) -> GpuCameraData {
        let view = self.view_matrix();
        let proj = self.projection_matrix();
        GpuCameraData {
            view: mat4_to_cols(&view),
            proj: mat4_to_cols(&proj),
            viewproj: mat4_to_cols(&(proj * view)),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 6.0, 10.0), 70.0, 1700.0 / 900.0, 0.1, 200.0)
    }
}
