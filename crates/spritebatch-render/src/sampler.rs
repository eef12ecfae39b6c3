//! Sampler presets for sprite textures.

use spritebatch_test_utils::{GpuSampler, RenderContext};

/// Common filtering setups for sprite sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerPreset {
    /// Bilinear filtering, clamped at the edges.
    Linear,
    /// Nearest-neighbour filtering for pixel art, clamped at the edges.
    Point,
}

impl SamplerPreset {
    pub fn descriptor(self) -> wgpu::SamplerDescriptor<'static> {
        let (label, filter) = match self {
            SamplerPreset::Linear => ("sprite_linear_sampler", wgpu::FilterMode::Linear),
            SamplerPreset::Point => ("sprite_point_sampler", wgpu::FilterMode::Nearest),
        };
        wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            ..Default::default()
        }
    }

    pub fn create(self, ctx: &dyn RenderContext) -> GpuSampler {
        ctx.create_sampler(&self.descriptor())
    }
}
