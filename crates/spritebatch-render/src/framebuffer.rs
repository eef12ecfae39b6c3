//! Framebuffer abstraction for offscreen rendering.

use crate::target::RenderTarget;
use spritebatch_test_utils::{GpuTexture, RenderContext};

/// An offscreen colour texture the renderer can draw into.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    texture: GpuTexture,
    target: RenderTarget,
}

impl Framebuffer {
    pub const DEFAULT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    pub fn new(ctx: &dyn RenderContext, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = ctx.create_texture(&wgpu::TextureDescriptor {
            label: Some("framebuffer_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = ctx.create_texture_view(&texture);

        Self {
            texture,
            target: RenderTarget::new(view, format, width, height),
        }
    }

    /// The colour texture, e.g. for readback.
    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn width(&self) -> u32 {
        self.target.width()
    }

    pub fn height(&self) -> u32 {
        self.target.height()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.target.format()
    }
}
