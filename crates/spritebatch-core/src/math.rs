//! Math types used across the workspace.
//!
//! CPU-side math goes through `glam`; matrices are converted to column-major
//! `[[f32; 4]; 4]` only at the GPU boundary.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Column-major 4x4 matrix in GPU layout.
pub type GpuMat4 = [[f32; 4]; 4];

/// Convert a `glam` matrix into its GPU layout.
#[inline]
pub fn to_gpu(matrix: Mat4) -> GpuMat4 {
    matrix.to_cols_array_2d()
}
