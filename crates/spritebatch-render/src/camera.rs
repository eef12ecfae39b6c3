//! Orthographic 2D camera.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use spritebatch_core::math::{GpuMat4, to_gpu};

/// Camera parameters, replaced wholesale by `SpriteRenderer::set_camera`.
///
/// The matrices are derived on demand every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// World position the view is centred on.
    pub position: Vec2,
    /// Half of the visible world height.
    pub ortho_half_height: f32,
    /// Target width over height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    pub fn new(position: Vec2, ortho_half_height: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            ortho_half_height,
            aspect_ratio,
            near,
            far,
        }
    }

    /// Off-center orthographic projection, depth mapped to [0, 1].
    pub fn projection(&self) -> Mat4 {
        let half_height = self.ortho_half_height;
        let half_width = half_height * self.aspect_ratio;
        Mat4::orthographic_rh(
            -half_width,
            half_width,
            -half_height,
            half_height,
            self.near,
            self.far,
        )
    }

    /// Translation by the negated camera position.
    ///
    /// Sprites stay on the z = 0 plane, which lies outside the near/far range,
    /// so this view needs a pipeline with depth clipping off.
    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, 0.0))
    }

    /// [`view`](Self::view) with the z = 0 plane pushed to the middle of the
    /// near/far range, for devices that always clip depth.
    pub fn depth_centred_view(&self) -> Mat4 {
        let depth = 0.5 * (self.near + self.far);
        Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, -depth))
    }

    /// Matrices for the uniform buffer. `unclipped_depth` says whether the
    /// pipeline has depth clipping off.
    pub fn uniform(&self, unclipped_depth: bool) -> CameraUniform {
        let view = if unclipped_depth {
            self.view()
        } else {
            self.depth_centred_view()
        };
        CameraUniform {
            projection: to_gpu(self.projection()),
            view: to_gpu(view),
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 5.0, 1.0, 0.1, 10.0)
    }
}

/// Camera block as laid out in the uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub projection: GpuMat4,
    pub view: GpuMat4,
}

pub const CAMERA_UNIFORM_SIZE: u64 = std::mem::size_of::<CameraUniform>() as u64;

static_assertions::const_assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
