//! The device seam used by the sprite renderer.
//!
//! [`RenderContext`] covers exactly what the renderer needs from a graphics
//! device: resource creation, host uploads, and submission of a recorded
//! [`CommandList`] guarded by a [`GpuFence`]. Descriptors that would reference
//! live wgpu objects are replaced by owned equivalents so a mock device can
//! accept them too.

use crate::gpu_types::*;
use std::ops::Range;
use std::time::Duration;

/// Resource bound at one binding slot of a bind group.
#[derive(Clone, Debug)]
pub enum BindingResource {
    /// Whole-buffer binding.
    Buffer(GpuBuffer),
    Sampler(GpuSampler),
    TextureView(GpuTextureView),
}

#[derive(Clone, Debug)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

/// Owned counterpart of `wgpu::BindGroupDescriptor`.
#[derive(Clone, Debug)]
pub struct BindGroupDesc<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a GpuBindGroupLayout,
    pub entries: &'a [BindGroupEntry],
}

/// A single-target render pipeline with one vertex and one fragment stage.
#[derive(Clone, Debug)]
pub struct RenderPipelineDesc<'a> {
    pub label: Option<&'a str>,
    pub shader: &'a GpuShaderModule,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    /// Layouts in bind group index order.
    pub bind_group_layouts: &'a [&'a GpuBindGroupLayout],
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub target_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    pub topology: wgpu::PrimitiveTopology,
    /// Turn depth clipping off. Needs [`RenderContext::supports_unclipped_depth`].
    pub unclipped_depth: bool,
}

/// One recorded GPU command.
#[derive(Clone, Debug)]
pub enum GpuCommand {
    CopyBufferToBuffer {
        source: GpuBuffer,
        source_offset: u64,
        destination: GpuBuffer,
        destination_offset: u64,
        size: u64,
    },
    BeginRenderPass {
        target: GpuTextureView,
        clear_color: wgpu::Color,
    },
    SetPipeline(GpuRenderPipeline),
    SetVertexBuffer {
        slot: u32,
        buffer: GpuBuffer,
    },
    SetIndexBuffer {
        buffer: GpuBuffer,
        format: wgpu::IndexFormat,
    },
    SetBindGroup {
        index: u32,
        bind_group: GpuBindGroup,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    EndRenderPass,
}

/// An ordered list of commands submitted as one unit.
///
/// The list is meant to be kept and cleared every frame; clearing keeps the
/// allocation.
#[derive(Clone, Debug, Default)]
pub struct CommandList {
    commands: Vec<GpuCommand>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn push(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        source: &GpuBuffer,
        source_offset: u64,
        destination: &GpuBuffer,
        destination_offset: u64,
        size: u64,
    ) {
        self.push(GpuCommand::CopyBufferToBuffer {
            source: source.clone(),
            source_offset,
            destination: destination.clone(),
            destination_offset,
            size,
        });
    }

    pub fn begin_render_pass(&mut self, target: &GpuTextureView, clear_color: wgpu::Color) {
        self.push(GpuCommand::BeginRenderPass {
            target: target.clone(),
            clear_color,
        });
    }

    pub fn set_pipeline(&mut self, pipeline: &GpuRenderPipeline) {
        self.push(GpuCommand::SetPipeline(pipeline.clone()));
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer) {
        self.push(GpuCommand::SetVertexBuffer {
            slot,
            buffer: buffer.clone(),
        });
    }

    pub fn set_index_buffer(&mut self, buffer: &GpuBuffer, format: wgpu::IndexFormat) {
        self.push(GpuCommand::SetIndexBuffer {
            buffer: buffer.clone(),
            format,
        });
    }

    pub fn set_bind_group(&mut self, index: u32, bind_group: &GpuBindGroup) {
        self.push(GpuCommand::SetBindGroup {
            index,
            bind_group: bind_group.clone(),
        });
    }

    pub fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.push(GpuCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    pub fn end_render_pass(&mut self) {
        self.push(GpuCommand::EndRenderPass);
    }

    /// Number of indexed draws recorded.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::DrawIndexed { .. }))
            .count()
    }
}

/// Failures reported by the device itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("fence was not signaled within {0:?}")]
    FenceTimeout(Duration),
    #[error("waited on a fence with no submitted work")]
    FenceNotSubmitted,
    #[error("device lost: {0}")]
    Lost(String),
}

/// Abstraction over the GPU operations the renderer performs.
///
/// Object safe, so renderers hold an `Arc<dyn RenderContext>` and tests swap
/// in `MockRenderContext`.
pub trait RenderContext: Send + Sync {
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> GpuBuffer;

    /// Upload `data` into `buffer` at `offset`. The write lands before any
    /// command list submitted afterwards executes.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> GpuTexture;

    /// Upload a full mip level 0 of a 2D texture.
    fn write_texture(&self, texture: &GpuTexture, data: &[u8], bytes_per_row: u32);

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView;

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> GpuSampler;

    fn create_shader_module(&self, desc: &wgpu::ShaderModuleDescriptor) -> GpuShaderModule;

    fn create_bind_group_layout(&self, desc: &wgpu::BindGroupLayoutDescriptor) -> GpuBindGroupLayout;

    fn create_bind_group(&self, desc: &BindGroupDesc) -> GpuBindGroup;

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> GpuRenderPipeline;

    /// Whether pipelines may set `unclipped_depth`
    /// (`wgpu::Features::DEPTH_CLIP_CONTROL`).
    fn supports_unclipped_depth(&self) -> bool;

    fn create_fence(&self) -> GpuFence;

    /// Submit `commands` and attach `fence` to the submission.
    fn submit(&self, commands: &CommandList, fence: &GpuFence);

    /// Block until `fence` signals. `None` waits without bound.
    fn wait_fence(&self, fence: &GpuFence, timeout: Option<Duration>) -> Result<(), DeviceError>;

    fn reset_fence(&self, fence: &GpuFence);
}
