//! Mock implementation of RenderContext for testing.
//!
//! The mock records every operation, including the full command list of each
//! submission, without touching a GPU.

use crate::{gpu_types::*, render_context::*};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use wgpu::*;

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone)]
pub enum RenderCall {
    CreateBuffer {
        label: Option<String>,
        size: u64,
        usage: BufferUsages,
    },
    WriteBuffer {
        buffer_id: usize,
        offset: u64,
        data: Vec<u8>,
    },
    CreateTexture {
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    WriteTexture {
        texture_id: usize,
        size: usize,
    },
    CreateTextureView {
        texture_id: usize,
    },
    CreateSampler {
        label: Option<String>,
    },
    CreateShaderModule {
        label: Option<String>,
    },
    CreateBindGroupLayout {
        label: Option<String>,
    },
    CreateBindGroup {
        label: Option<String>,
        layout_id: usize,
    },
    CreateRenderPipeline {
        label: Option<String>,
        target_format: TextureFormat,
        unclipped_depth: bool,
    },
    CreateFence,
    Submit {
        commands: Vec<GpuCommand>,
    },
    WaitFence {
        timeout: Option<Duration>,
    },
    ResetFence,
}

/// An indexed draw decoded from a submission, with the bind groups that were
/// bound when it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDraw {
    /// Bind group index to bind group mock id.
    pub bind_groups: BTreeMap<u32, usize>,
    pub indices: Range<u32>,
    pub base_vertex: i32,
    pub instances: Range<u32>,
}

impl MockDraw {
    pub fn instance_count(&self) -> u32 {
        self.instances.end - self.instances.start
    }
}

#[derive(Debug, Default)]
struct MockIds {
    buffers: AtomicUsize,
    textures: AtomicUsize,
    views: AtomicUsize,
    samplers: AtomicUsize,
    shaders: AtomicUsize,
    layouts: AtomicUsize,
    bind_groups: AtomicUsize,
    pipelines: AtomicUsize,
}

fn next(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Mock implementation of RenderContext for testing.
///
/// Methods take `&self` and record into a `parking_lot::Mutex`, which keeps
/// the mock `Send + Sync` like a real device.
///
/// # Example
///
/// ```rust
/// use spritebatch_test_utils::{MockRenderContext, RenderContext};
/// use wgpu::*;
///
/// let mock = MockRenderContext::new();
///
/// let buffer = mock.create_buffer(&BufferDescriptor {
///     label: None,
///     size: 1024,
///     usage: BufferUsages::VERTEX,
///     mapped_at_creation: false,
/// });
///
/// assert!(buffer.is_mock());
/// assert_eq!(mock.count_buffer_creates(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockRenderContext {
    calls: Mutex<Vec<RenderCall>>,
    ids: MockIds,
    stall_fences: AtomicBool,
    depth_clip_only: AtomicBool,
}

impl MockRenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following fence wait fail with a timeout, as a hung device would.
    pub fn set_fence_timeout(&self, stall: bool) {
        self.stall_fences.store(stall, Ordering::Relaxed);
    }

    /// Pretend the device lacks `DEPTH_CLIP_CONTROL`. The mock supports it by default.
    pub fn set_depth_clip_only(&self, depth_clip_only: bool) {
        self.depth_clip_only.store(depth_clip_only, Ordering::Relaxed);
    }

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn count(&self, predicate: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBuffer { .. }))
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::WriteBuffer { .. }))
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateTexture { .. }))
    }

    pub fn count_shader_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateShaderModule { .. }))
    }

    pub fn count_bind_group_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBindGroup { .. }))
    }

    pub fn count_render_pipeline_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateRenderPipeline { .. }))
    }

    pub fn count_submits(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::Submit { .. }))
    }

    /// Bytes of every write to the buffer with mock id `buffer_id`, in order.
    pub fn buffer_writes(&self, buffer_id: usize) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::WriteBuffer {
                    buffer_id: id,
                    data,
                    ..
                } if *id == buffer_id => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Commands of the most recent submission.
    pub fn last_submission(&self) -> Option<Vec<GpuCommand>> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            RenderCall::Submit { commands } => Some(commands.clone()),
            _ => None,
        })
    }

    /// Indexed draws of the most recent submission, in issue order.
    pub fn draw_calls(&self) -> Vec<MockDraw> {
        let Some(commands) = self.last_submission() else {
            return Vec::new();
        };

        let mut bound = BTreeMap::new();
        let mut draws = Vec::new();
        for command in &commands {
            match command {
                GpuCommand::SetBindGroup { index, bind_group } => {
                    if let Some(id) = bind_group.mock_id() {
                        bound.insert(*index, id);
                    }
                }
                GpuCommand::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => draws.push(MockDraw {
                    bind_groups: bound.clone(),
                    indices: indices.clone(),
                    base_vertex: *base_vertex,
                    instances: instances.clone(),
                }),
                GpuCommand::EndRenderPass => bound.clear(),
                _ => {}
            }
        }
        draws
    }

    fn record(&self, call: RenderCall) {
        self.calls.lock().push(call);
    }
}

impl RenderContext for MockRenderContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer {
        self.record(RenderCall::CreateBuffer {
            label: desc.label.map(str::to_string),
            size: desc.size,
            usage: desc.usage,
        });
        GpuBuffer::mock(next(&self.ids.buffers), desc.size)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        if let Some(buffer_id) = buffer.mock_id() {
            self.record(RenderCall::WriteBuffer {
                buffer_id,
                offset,
                data: data.to_vec(),
            });
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuTexture {
        self.record(RenderCall::CreateTexture {
            width: desc.size.width,
            height: desc.size.height,
            format: desc.format,
        });
        GpuTexture::mock(
            next(&self.ids.textures),
            desc.size.width,
            desc.size.height,
            desc.format,
        )
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8], _bytes_per_row: u32) {
        if let Some(texture_id) = texture.mock_id() {
            self.record(RenderCall::WriteTexture {
                texture_id,
                size: data.len(),
            });
        }
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        self.record(RenderCall::CreateTextureView {
            texture_id: texture.mock_id().unwrap_or(usize::MAX),
        });
        GpuTextureView::mock(next(&self.ids.views))
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuSampler {
        self.record(RenderCall::CreateSampler {
            label: desc.label.map(str::to_string),
        });
        GpuSampler::mock(next(&self.ids.samplers))
    }

    fn create_shader_module(&self, desc: &ShaderModuleDescriptor) -> GpuShaderModule {
        self.record(RenderCall::CreateShaderModule {
            label: desc.label.map(str::to_string),
        });
        GpuShaderModule::mock(next(&self.ids.shaders))
    }

    fn create_bind_group_layout(&self, desc: &BindGroupLayoutDescriptor) -> GpuBindGroupLayout {
        self.record(RenderCall::CreateBindGroupLayout {
            label: desc.label.map(str::to_string),
        });
        GpuBindGroupLayout::mock(next(&self.ids.layouts))
    }

    fn create_bind_group(&self, desc: &BindGroupDesc) -> GpuBindGroup {
        self.record(RenderCall::CreateBindGroup {
            label: desc.label.map(str::to_string),
            layout_id: desc.layout.mock_id().unwrap_or(usize::MAX),
        });
        GpuBindGroup::mock(next(&self.ids.bind_groups))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> GpuRenderPipeline {
        self.record(RenderCall::CreateRenderPipeline {
            label: desc.label.map(str::to_string),
            target_format: desc.target_format,
            unclipped_depth: desc.unclipped_depth,
        });
        GpuRenderPipeline::mock(next(&self.ids.pipelines))
    }

    fn supports_unclipped_depth(&self) -> bool {
        !self.depth_clip_only.load(Ordering::Relaxed)
    }

    fn create_fence(&self) -> GpuFence {
        self.record(RenderCall::CreateFence);
        GpuFence::new()
    }

    fn submit(&self, commands: &CommandList, fence: &GpuFence) {
        self.record(RenderCall::Submit {
            commands: commands.commands().to_vec(),
        });
        fence.mark_submitted(None);
    }

    fn wait_fence(&self, fence: &GpuFence, timeout: Option<Duration>) -> Result<(), DeviceError> {
        self.record(RenderCall::WaitFence { timeout });
        match fence.state() {
            FenceState::Unsignaled => Err(DeviceError::FenceNotSubmitted),
            FenceState::Signaled => Ok(()),
            FenceState::Submitted(_) if self.stall_fences.load(Ordering::Relaxed) => {
                Err(DeviceError::FenceTimeout(timeout.unwrap_or_default()))
            }
            FenceState::Submitted(_) => {
                fence.signal();
                Ok(())
            }
        }
    }

    fn reset_fence(&self, fence: &GpuFence) {
        self.record(RenderCall::ResetFence);
        fence.reset();
    }
}
