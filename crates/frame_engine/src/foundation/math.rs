//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of conversions the GPU data
//! structures need.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Convert a matrix into the column-major array layout used by shaders
pub fn mat4_to_cols(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Convert a vector into a plain array for GPU upload
pub fn vec4_to_array(vector: &Vec4) -> [f32; 4] {
    [vector.x, vector.y, vector.z, vector.w]
}
