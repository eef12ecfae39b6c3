//! Sprite shader, bind group layouts and the target-dependent render pipeline.

use spritebatch_core::profiling::profile_function;
use spritebatch_test_utils::{
    GpuBindGroupLayout, GpuRenderPipeline, GpuShaderModule, RenderContext, RenderPipelineDesc,
};

use crate::quad::QuadVertex;
use crate::target::{RenderTarget, TargetId};

const SPRITE_SHADER: &str = include_str!("shaders/sprite.wgsl");

/// Bind group indices used by the sprite shader.
pub mod groups {
    pub const CAMERA: u32 = 0;
    pub const INSTANCES: u32 = 1;
    pub const SAMPLER: u32 = 2;
    pub const TEXTURE: u32 = 3;
}

/// Layouts for the four bind groups, in group order.
#[derive(Debug)]
pub struct SpriteLayouts {
    pub camera: GpuBindGroupLayout,
    pub instances: GpuBindGroupLayout,
    pub sampler: GpuBindGroupLayout,
    pub texture: GpuBindGroupLayout,
}

impl SpriteLayouts {
    pub fn new(ctx: &dyn RenderContext) -> Self {
        let camera = ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_camera_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let instances = ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_instances_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let sampler = ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_sampler_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            }],
        });

        let texture = ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_texture_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        Self {
            camera,
            instances,
            sampler,
            texture,
        }
    }
}

#[derive(Debug)]
struct CachedPipeline {
    target: TargetId,
    format: wgpu::TextureFormat,
    pipeline: GpuRenderPipeline,
}

/// Owns the shader and layouts, and keeps one pipeline for the current target.
#[derive(Debug)]
pub struct PipelineCache {
    shader: GpuShaderModule,
    layouts: SpriteLayouts,
    current: Option<CachedPipeline>,
    rebuilds: usize,
    unclipped_depth: bool,
}

impl PipelineCache {
    pub fn new(ctx: &dyn RenderContext) -> Self {
        let shader = ctx.create_shader_module(&wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE_SHADER.into()),
        });

        Self {
            shader,
            layouts: SpriteLayouts::new(ctx),
            current: None,
            rebuilds: 0,
            unclipped_depth: ctx.supports_unclipped_depth(),
        }
    }

    pub fn layouts(&self) -> &SpriteLayouts {
        &self.layouts
    }

    /// Whether pipelines are built with depth clipping off. When false the
    /// camera has to move the sprite plane into the depth range itself.
    pub fn unclipped_depth(&self) -> bool {
        self.unclipped_depth
    }

    /// Build the pipeline unless the cached one was built for this target.
    ///
    /// Returns whether a new pipeline was created.
    pub fn ensure(&mut self, ctx: &dyn RenderContext, target: &RenderTarget) -> bool {
        if let Some(current) = &self.current
            && current.target == target.id()
            && current.format == target.format()
        {
            return false;
        }

        profile_function!();
        let layouts = [
            &self.layouts.camera,
            &self.layouts.instances,
            &self.layouts.sampler,
            &self.layouts.texture,
        ];
        let pipeline = ctx.create_render_pipeline(&RenderPipelineDesc {
            label: Some("sprite_pipeline"),
            shader: &self.shader,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            bind_group_layouts: &layouts,
            vertex_buffers: &[QuadVertex::layout()],
            target_format: target.format(),
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            topology: wgpu::PrimitiveTopology::TriangleList,
            unclipped_depth: self.unclipped_depth,
        });

        self.current = Some(CachedPipeline {
            target: target.id(),
            format: target.format(),
            pipeline,
        });
        self.rebuilds += 1;
        tracing::info!(
            "Built sprite pipeline for {:?} ({:?}, unclipped depth: {})",
            target.id(),
            target.format(),
            self.unclipped_depth
        );
        true
    }

    pub fn pipeline(&self) -> Option<&GpuRenderPipeline> {
        self.current.as_ref().map(|current| &current.pipeline)
    }

    /// Pipelines built so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }
}
