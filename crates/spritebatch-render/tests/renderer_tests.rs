//! Sprite renderer tests against the recording mock device (no GPU required).
//!
//! These cover batching, instance assembly, the submitted command stream and
//! the error paths of `render`.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use parking_lot::Mutex;
use spritebatch_core::{ConfigError, RendererConfig};
use spritebatch_render::instance::model_matrix;
use spritebatch_render::{
    BoundingBox, Color, DrawRequest, Framebuffer, InstanceRecord, SamplerPreset,
    SpriteId, SpriteRenderError, SpriteRenderer, SpriteTexture,
};
use spritebatch_test_utils::{
    BindGroupDesc, CommandList, DeviceError, GpuBindGroup, GpuBindGroupLayout, GpuBuffer,
    GpuCommand, GpuFence, GpuRenderPipeline, GpuSampler, GpuShaderModule, GpuTexture,
    GpuTextureView, MockRenderContext, RenderCall, RenderContext, RenderPipelineDesc,
};

struct Harness {
    mock: Arc<MockRenderContext>,
    renderer: SpriteRenderer,
    framebuffer: Framebuffer,
    textures: Vec<Arc<SpriteTexture>>,
}

impl Harness {
    fn new(config: RendererConfig) -> Self {
        let mock = Arc::new(MockRenderContext::new());
        Self::with_device(mock.clone(), mock, config)
    }

    /// Render through `device`, which must forward to `mock`.
    fn with_device(
        mock: Arc<MockRenderContext>,
        device: Arc<dyn RenderContext>,
        config: RendererConfig,
    ) -> Self {
        let mut renderer = SpriteRenderer::new(device, config).unwrap();
        let framebuffer = Framebuffer::new(&*mock, 800, 400, Framebuffer::DEFAULT_FORMAT);

        renderer.set_sampler(&SamplerPreset::Linear.create(&*mock));
        renderer.set_camera(framebuffer.target(), Vec2::ZERO, 5.0, 0.1, 10.0);

        Self {
            mock,
            renderer,
            framebuffer,
            textures: Vec::new(),
        }
    }

    fn small() -> Self {
        Self::new(
            RendererConfig::default()
                .with_max_batches(2)
                .with_max_draws_per_batch(3)
                .with_max_instances(10)
                .with_worker_threads(2),
        )
    }

    fn textured_sprite(&mut self) -> SpriteId {
        let texture = SpriteTexture::from_rgba8(&*self.mock, 2, 2, &[255; 16]).unwrap();
        let sprite = self.renderer.create_sprite();
        self.renderer.set_sprite_texture(sprite, &texture).unwrap();
        self.textures.push(texture);
        sprite
    }

    fn texture_group(&self, sprite: SpriteId) -> usize {
        self.renderer
            .sprite(sprite)
            .unwrap()
            .bind_group()
            .and_then(|group| group.mock_id())
            .unwrap()
    }

    fn draw_at(&mut self, sprite: SpriteId, x: f32, y: f32) -> Result<(), SpriteRenderError> {
        self.renderer
            .draw(sprite, Vec2::new(x, y), Vec2::ONE, 0.0, BoundingBox::IDENTITY)
    }
}

/// Forwards to a mock device and releases a held texture during the first
/// instance upload, after the renderer has assembled the frame.
struct ReleasingDevice {
    mock: Arc<MockRenderContext>,
    held: Mutex<Option<Arc<SpriteTexture>>>,
}

impl ReleasingDevice {
    fn new(mock: Arc<MockRenderContext>) -> Self {
        Self {
            mock,
            held: Mutex::new(None),
        }
    }

    fn release_during_upload(&self, texture: Arc<SpriteTexture>) {
        *self.held.lock() = Some(texture);
    }

    fn released(&self) -> bool {
        self.held.lock().is_none()
    }
}

impl RenderContext for ReleasingDevice {
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> GpuBuffer {
        self.mock.create_buffer(desc)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        // Camera writes are 128 bytes; instance uploads are whole records.
        if !data.is_empty() && data.len() as u64 % InstanceRecord::SIZE == 0 {
            self.held.lock().take();
        }
        self.mock.write_buffer(buffer, offset, data);
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> GpuTexture {
        self.mock.create_texture(desc)
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8], bytes_per_row: u32) {
        self.mock.write_texture(texture, data, bytes_per_row);
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        self.mock.create_texture_view(texture)
    }

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> GpuSampler {
        self.mock.create_sampler(desc)
    }

    fn create_shader_module(&self, desc: &wgpu::ShaderModuleDescriptor) -> GpuShaderModule {
        self.mock.create_shader_module(desc)
    }

    fn create_bind_group_layout(&self, desc: &wgpu::BindGroupLayoutDescriptor) -> GpuBindGroupLayout {
        self.mock.create_bind_group_layout(desc)
    }

    fn create_bind_group(&self, desc: &BindGroupDesc) -> GpuBindGroup {
        self.mock.create_bind_group(desc)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> GpuRenderPipeline {
        self.mock.create_render_pipeline(desc)
    }

    fn supports_unclipped_depth(&self) -> bool {
        self.mock.supports_unclipped_depth()
    }

    fn create_fence(&self) -> GpuFence {
        self.mock.create_fence()
    }

    fn submit(&self, commands: &CommandList, fence: &GpuFence) {
        self.mock.submit(commands, fence);
    }

    fn wait_fence(&self, fence: &GpuFence, timeout: Option<Duration>) -> Result<(), DeviceError> {
        self.mock.wait_fence(fence, timeout)
    }

    fn reset_fence(&self, fence: &GpuFence) {
        self.mock.reset_fence(fence);
    }
}

fn request_at(x: f32, y: f32) -> DrawRequest {
    DrawRequest::new(Vec2::new(x, y), Vec2::ONE, 0.0, BoundingBox::IDENTITY)
}

fn copy_sizes(commands: &[GpuCommand]) -> Vec<u64> {
    commands
        .iter()
        .filter_map(|command| match command {
            GpuCommand::CopyBufferToBuffer { size, .. } => Some(*size),
            _ => None,
        })
        .collect()
}

#[test]
fn test_two_sprite_scenario() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();

    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(b, 1.0, 0.0).unwrap();
    h.draw_at(a, 0.0, 1.0).unwrap();

    let batches = h.renderer.batches();
    assert_eq!(batches.active_count(), 2);
    assert_eq!(batches.active()[0].sprite(), Some(a));
    assert_eq!(
        batches.active()[0].requests(),
        &[request_at(0.0, 0.0), request_at(0.0, 1.0)]
    );
    assert_eq!(batches.active()[1].sprite(), Some(b));
    assert_eq!(batches.active()[1].requests(), &[request_at(1.0, 0.0)]);

    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.instances, 3);

    let draws = h.mock.draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].instances, 0..2);
    assert_eq!(draws[1].instances, 2..3);
    assert_eq!(draws[0].indices, 0..6);
    assert_eq!(draws[0].bind_groups[&3], h.texture_group(a));
    assert_eq!(draws[1].bind_groups[&3], h.texture_group(b));

    let instances = h.renderer.instances();
    assert_eq!(instances.len(), 3);
    assert_eq!(instances[1], InstanceRecord::from_request(&request_at(0.0, 1.0)));
    assert_eq!(instances[2], InstanceRecord::from_request(&request_at(1.0, 0.0)));
}

#[test]
fn test_one_draw_per_distinct_sprite() {
    let mut h = Harness::new(RendererConfig::default().with_worker_threads(3));
    let sprites: Vec<_> = (0..5).map(|_| h.textured_sprite()).collect();

    let mut submitted = 0;
    for i in 0..137 {
        let sprite = sprites[(i * 7) % sprites.len()];
        h.draw_at(sprite, i as f32, 0.0).unwrap();
        submitted += 1;
    }

    h.renderer.render(true, Color::BLACK, 4).unwrap();
    let draws = h.mock.draw_calls();
    assert_eq!(draws.len(), sprites.len());
    assert_eq!(
        draws.iter().map(|d| d.instance_count() as usize).sum::<usize>(),
        submitted
    );

    // Ranges are contiguous and start at zero.
    let mut next = 0;
    for draw in &draws {
        assert_eq!(draw.instances.start, next);
        next = draw.instances.end;
    }
}

#[test]
fn test_frame_setup_bound_once() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(b, 0.0, 0.0).unwrap();
    h.renderer.render(false, Color::CORNFLOWER_BLUE, 1).unwrap();

    let commands = h.mock.last_submission().unwrap();
    let count = |pred: fn(&GpuCommand) -> bool| commands.iter().filter(|c| pred(c)).count();
    assert_eq!(count(|c| matches!(c, GpuCommand::SetPipeline(_))), 1);
    assert_eq!(count(|c| matches!(c, GpuCommand::SetVertexBuffer { .. })), 1);
    assert_eq!(count(|c| matches!(c, GpuCommand::SetIndexBuffer { .. })), 1);
    assert_eq!(
        count(|c| matches!(c, GpuCommand::SetBindGroup { index: 0..=2, .. })),
        3
    );
    assert_eq!(count(|c| matches!(c, GpuCommand::SetBindGroup { index: 3, .. })), 2);

    // Uploads are recorded before the pass and cover only this frame's data.
    assert!(matches!(commands[0], GpuCommand::CopyBufferToBuffer { .. }));
    assert!(matches!(commands[1], GpuCommand::CopyBufferToBuffer { .. }));
    assert_eq!(copy_sizes(&commands), vec![128, 2 * InstanceRecord::SIZE]);
    match &commands[2] {
        GpuCommand::BeginRenderPass {
            target,
            clear_color,
        } => {
            assert_eq!(target.mock_id(), h.framebuffer.target().view().mock_id());
            assert_eq!(*clear_color, Color::CORNFLOWER_BLUE.to_wgpu());
        }
        other => panic!("expected render pass, got {other:?}"),
    }
    assert!(matches!(commands.last(), Some(GpuCommand::EndRenderPass)));
}

#[test]
fn test_camera_uploaded_every_frame() {
    let mut h = Harness::small();
    let camera = h.renderer.camera().uniform(true);
    assert_eq!(h.renderer.camera().aspect_ratio, 2.0);

    h.renderer.render(false, Color::BLACK, 1).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();

    let camera_writes: Vec<_> = h
        .mock
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RenderCall::WriteBuffer { data, .. } if data.len() == 128 => Some(data),
            _ => None,
        })
        .collect();
    assert_eq!(camera_writes.len(), 2);
    assert!(camera_writes.iter().all(|data| data == bytemuck::bytes_of(&camera)));
}

#[test]
fn test_camera_falls_back_to_centred_view_without_depth_clip_control() {
    let mock = Arc::new(MockRenderContext::new());
    mock.set_depth_clip_only(true);
    let mut h = Harness::with_device(
        mock.clone(),
        mock,
        RendererConfig::default().with_worker_threads(1),
    );
    assert!(!h.renderer.pipelines().unclipped_depth());

    h.renderer.render(false, Color::BLACK, 1).unwrap();
    let expected = h.renderer.camera().uniform(false);
    let uploaded = h.mock.calls().into_iter().find_map(|call| match call {
        RenderCall::WriteBuffer { data, .. } if data.len() == 128 => Some(data),
        _ => None,
    });
    assert_eq!(uploaded.as_deref(), Some(bytemuck::bytes_of(&expected)));
    assert_ne!(expected, h.renderer.camera().uniform(true));
}

#[test]
fn test_empty_frame_still_submits() {
    let mut h = Harness::small();
    let stats = h.renderer.render(true, Color::BLACK, 8).unwrap();

    assert_eq!(stats.draw_calls, 0);
    assert_eq!(h.mock.count_submits(), 1);
    assert_eq!(copy_sizes(&h.mock.last_submission().unwrap()), vec![128]);
}

#[test]
fn test_grouping_preserves_order() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();

    h.draw_at(a, 1.0, 0.0).unwrap();
    h.draw_at(b, 9.0, 9.0).unwrap();
    h.draw_at(a, 2.0, 0.0).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();

    let instances = h.renderer.instances();
    assert_eq!(instances[0], InstanceRecord::from_request(&request_at(1.0, 0.0)));
    assert_eq!(instances[1], InstanceRecord::from_request(&request_at(2.0, 0.0)));
}

#[test]
fn test_full_batch_keeps_three() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    for i in 0..3 {
        h.draw_at(a, i as f32, 0.0).unwrap();
    }

    let err = h.draw_at(a, 3.0, 0.0).unwrap_err();
    assert_eq!(err, SpriteRenderError::BatchFull { sprite: a, capacity: 3 });
    assert_eq!(h.renderer.batches().active()[0].len(), 3);
    assert_eq!(h.renderer.batches().draw_count(), 3);
}

#[test]
fn test_distinct_sprite_limit() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();
    let c = h.textured_sprite();

    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(b, 0.0, 0.0).unwrap();
    assert_eq!(
        h.draw_at(c, 0.0, 0.0),
        Err(SpriteRenderError::BatchLimitExceeded { limit: 2 })
    );
    assert_eq!(h.renderer.batches().active_count(), 2);
}

#[test]
fn test_draw_limit_leaves_table_untouched() {
    let mut h = Harness::new(
        RendererConfig::default()
            .with_max_batches(4)
            .with_max_draws_per_batch(4)
            .with_max_instances(3),
    );
    let a = h.textured_sprite();
    let b = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(a, 1.0, 0.0).unwrap();
    h.draw_at(b, 2.0, 0.0).unwrap();

    let before: Vec<_> = h
        .renderer
        .batches()
        .active()
        .iter()
        .map(|batch| (batch.sprite(), batch.requests().to_vec()))
        .collect();

    assert_eq!(
        h.draw_at(b, 3.0, 0.0),
        Err(SpriteRenderError::DrawLimitExceeded { limit: 3 })
    );
    let after: Vec<_> = h
        .renderer
        .batches()
        .active()
        .iter()
        .map(|batch| (batch.sprite(), batch.requests().to_vec()))
        .collect();
    assert_eq!(before, after);
    assert_eq!(h.renderer.batches().draw_count(), 3);

    // The frame still renders what was accepted.
    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(stats.instances, 3);
}

#[test]
fn test_textureless_sprite_is_dropped() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let bare = h.renderer.create_sprite();

    h.renderer
        .draw(bare, Vec2::ZERO, Vec2::ONE, 0.0, BoundingBox::IDENTITY)
        .unwrap();
    assert_eq!(h.renderer.batches().active_count(), 0);
    assert_eq!(h.renderer.batches().draw_count(), 0);

    h.draw_at(a, 0.0, 0.0).unwrap();
    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(h.mock.draw_calls()[0].bind_groups[&3], h.texture_group(a));
}

#[test]
fn test_texture_dropped_after_draw_is_skipped() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(b, 5.0, 0.0).unwrap();
    h.draw_at(b, 6.0, 0.0).unwrap();

    // Release the only strong reference to a's texture.
    h.textures.remove(0);

    let stats = h.renderer.render(true, Color::BLACK, 1).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.skipped_batches, 1);
    assert_eq!(stats.instances, 2);

    let draws = h.mock.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 0..2);
    assert_eq!(
        h.renderer.instances()[0],
        InstanceRecord::from_request(&request_at(5.0, 0.0))
    );
}

#[test]
fn test_texture_released_during_upload_keeps_draw_offsets() {
    let mock = Arc::new(MockRenderContext::new());
    let device = Arc::new(ReleasingDevice::new(mock.clone()));
    let mut h = Harness::with_device(mock, device.clone(), RendererConfig::default());
    let a = h.textured_sprite();
    let b = h.textured_sprite();
    for x in 0..3 {
        h.draw_at(a, x as f32, 0.0).unwrap();
    }
    h.draw_at(b, 100.0, 0.0).unwrap();

    device.release_during_upload(h.textures.remove(0));
    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert!(device.released());
    assert!(h.renderer.sprite(a).unwrap().texture().is_none());

    // The frame was assembled with a's texture alive, so a is still drawn.
    assert_eq!(stats.instances, 4);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.skipped_batches, 0);

    let draws = h.mock.draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].instances, 0..3);
    assert_eq!(draws[1].instances, 3..4);
    assert_eq!(draws[1].bind_groups[&3], h.texture_group(b));
    assert_eq!(
        h.renderer.instances()[3],
        InstanceRecord::from_request(&request_at(100.0, 0.0))
    );

    // The next frame sees the release.
    h.draw_at(b, 100.0, 0.0).unwrap();
    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(h.mock.draw_calls()[0].instances, 0..1);
}

#[test]
fn test_single_and_multi_threaded_match() {
    let mut h = Harness::new(
        RendererConfig::default()
            .with_max_batches(8)
            .with_max_draws_per_batch(64)
            .with_max_instances(256)
            .with_worker_threads(4),
    );
    let sprites: Vec<_> = (0..3).map(|_| h.textured_sprite()).collect();

    let register = |renderer: &mut SpriteRenderer| {
        for i in 0..100 {
            let f = i as f32;
            renderer
                .draw(
                    sprites[i % 3],
                    Vec2::new(f.sin() * 4.0, f.cos() * 2.0),
                    Vec2::new(0.5 + f * 0.01, 1.5),
                    f * 0.37,
                    BoundingBox::grid_cell(4, 4, (i % 4) as u32, (i / 4 % 4) as u32),
                )
                .unwrap();
        }
    };

    register(&mut h.renderer);
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    let expected = h.renderer.instances().to_vec();

    for chunk_size in [1, 3, 16, 33, 1000] {
        register(&mut h.renderer);
        let stats = h.renderer.render(true, Color::BLACK, chunk_size).unwrap();
        assert!(stats.tasks >= 3);
        assert_eq!(
            bytemuck::cast_slice::<InstanceRecord, u8>(h.renderer.instances()),
            bytemuck::cast_slice::<InstanceRecord, u8>(&expected),
            "chunk size {chunk_size}"
        );
    }
}

#[test]
fn test_repeat_frame_is_identical() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let b = h.textured_sprite();

    let frame = |h: &mut Harness| {
        h.draw_at(a, 0.0, 0.0).unwrap();
        h.draw_at(b, 1.0, 0.0).unwrap();
        h.draw_at(a, 0.0, 1.0).unwrap();
        h.renderer.render(true, Color::BLACK, 1).unwrap();
        assert_eq!(h.renderer.batches().active_count(), 0);
        assert_eq!(h.renderer.batches().draw_count(), 0);
        h.renderer.instances().to_vec()
    };

    let first = frame(&mut h);
    let second = frame(&mut h);
    assert_eq!(first, second);
}

#[test]
fn test_pipeline_reused_across_frames() {
    let mut h = Harness::small();
    let creates_before = h.mock.count_render_pipeline_creates();

    h.renderer.render(false, Color::BLACK, 1).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(h.mock.count_render_pipeline_creates(), creates_before + 1);

    // Same target again, camera moved.
    let target = h.framebuffer.target().clone();
    h.renderer.set_camera(&target, Vec2::new(3.0, 1.0), 2.0, 0.1, 10.0);
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(h.renderer.pipelines().rebuild_count(), 1);

    // A different target needs a new pipeline.
    let other = Framebuffer::new(&*h.mock, 64, 64, wgpu::TextureFormat::Bgra8UnormSrgb);
    h.renderer.set_camera(other.target(), Vec2::ZERO, 5.0, 0.1, 10.0);
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(h.renderer.pipelines().rebuild_count(), 2);
    assert_eq!(h.mock.count_render_pipeline_creates(), creates_before + 2);
}

#[test]
fn test_fence_timeout_propagates() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();

    h.mock.set_fence_timeout(true);
    let err = h.renderer.render(false, Color::BLACK, 1).unwrap_err();
    assert_eq!(
        err,
        SpriteRenderError::Device(DeviceError::FenceTimeout(Duration::from_secs(5)))
    );

    // The frame was consumed and the fence is ready for the next one.
    assert_eq!(h.renderer.batches().active_count(), 0);
    h.mock.set_fence_timeout(false);
    h.draw_at(a, 0.0, 0.0).unwrap();
    assert_eq!(h.renderer.render(false, Color::BLACK, 1).unwrap().draw_calls, 1);
}

#[test]
fn test_fence_wait_uses_configured_timeout() {
    let mut h = Harness::new(RendererConfig::default().with_fence_timeout(None));
    h.renderer.render(false, Color::BLACK, 1).unwrap();

    let waits: Vec<_> = h
        .mock
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RenderCall::WaitFence { timeout } => Some(timeout),
            _ => None,
        })
        .collect();
    assert_eq!(waits, vec![None]);
}

#[test]
fn test_missing_camera_keeps_draws() {
    let mock = Arc::new(MockRenderContext::new());
    let mut renderer = SpriteRenderer::new(mock.clone(), RendererConfig::default()).unwrap();
    let texture = SpriteTexture::from_rgba8(&*mock, 1, 1, &[0, 0, 0, 255]).unwrap();
    let sprite = renderer.create_sprite();
    renderer.set_sprite_texture(sprite, &texture).unwrap();
    renderer.draw_sprite(sprite, Vec2::ZERO, Vec2::ONE, 0.0).unwrap();

    assert_eq!(
        renderer.render(false, Color::BLACK, 1),
        Err(SpriteRenderError::NoRenderTarget)
    );
    assert_eq!(renderer.batches().draw_count(), 1);

    let framebuffer = Framebuffer::new(&*mock, 32, 32, Framebuffer::DEFAULT_FORMAT);
    renderer.set_camera(framebuffer.target(), Vec2::ZERO, 5.0, 0.1, 10.0);
    assert_eq!(
        renderer.render(false, Color::BLACK, 1),
        Err(SpriteRenderError::NoSampler)
    );
    assert_eq!(mock.count_submits(), 0);

    renderer.set_sampler(&SamplerPreset::Point.create(&*mock));
    assert_eq!(renderer.render(false, Color::BLACK, 1).unwrap().draw_calls, 1);
}

#[test]
fn test_zero_chunk_size() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();

    assert_eq!(
        h.renderer.render(true, Color::BLACK, 0),
        Err(SpriteRenderError::InvalidChunkSize)
    );
    assert_eq!(h.renderer.batches().draw_count(), 1);

    // The single-threaded path ignores the chunk size.
    assert!(h.renderer.render(false, Color::BLACK, 0).is_ok());
}

#[test]
fn test_sampler_change_rebinds() {
    let mut h = Harness::small();
    let a = h.textured_sprite();

    h.draw_at(a, 0.0, 0.0).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    let first = h.mock.draw_calls()[0].bind_groups[&2];

    h.renderer.set_sampler(&SamplerPreset::Point.create(&*h.mock));
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_ne!(h.mock.draw_calls()[0].bind_groups[&2], first);
}

#[test]
fn test_texture_change_regenerates_bind_group() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let old_group = h.texture_group(a);

    let replacement = SpriteTexture::from_rgba8(&*h.mock, 1, 1, &[1, 2, 3, 4]).unwrap();
    h.renderer.set_sprite_texture(a, &replacement).unwrap();
    assert_ne!(h.texture_group(a), old_group);

    h.draw_at(a, 0.0, 0.0).unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(h.mock.draw_calls()[0].bind_groups[&3], h.texture_group(a));

    h.renderer.clear_sprite_texture(a).unwrap();
    assert!(!h.renderer.sprite(a).unwrap().is_render_ready());
}

#[test]
fn test_draw_sprite_uses_default_bounds() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    let cell = BoundingBox::grid_cell(2, 2, 1, 0);
    h.renderer.set_sprite_bounds(a, cell).unwrap();

    h.renderer
        .draw_sprite(a, Vec2::new(1.0, 2.0), Vec2::splat(0.5), 0.25)
        .unwrap();
    h.renderer.render(false, Color::BLACK, 1).unwrap();

    let record = h.renderer.instances()[0];
    assert_eq!(record.bounds, cell);
    let request = DrawRequest::new(Vec2::new(1.0, 2.0), Vec2::splat(0.5), 0.25, cell);
    assert_eq!(record.model, model_matrix(&request).to_cols_array_2d());
}

#[test]
fn test_draw_grouped() {
    let mut h = Harness::small();
    let a = h.textured_sprite();

    let positions = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
    let scales = [Vec2::ONE; 2];
    let rotations = [0.0; 2];
    let bounds = [BoundingBox::IDENTITY; 2];

    assert_eq!(
        h.renderer
            .draw_grouped(a, &positions, &scales, &rotations[..1], &bounds),
        Err(SpriteRenderError::MismatchedLengths {
            positions: 2,
            scales: 2,
            rotations: 1,
            bounds: 2,
        })
    );

    h.renderer
        .draw_grouped(a, &positions, &scales, &rotations, &bounds)
        .unwrap();
    assert_eq!(
        h.renderer.batches().active()[0].requests(),
        &[request_at(0.0, 0.0), request_at(1.0, 0.0)]
    );

    // Two more would overflow the 3-draw batch: nothing is added.
    assert!(matches!(
        h.renderer
            .draw_grouped(a, &positions, &scales, &rotations, &bounds),
        Err(SpriteRenderError::BatchFull { .. })
    ));
    assert_eq!(h.renderer.batches().draw_count(), 2);
}

#[test]
fn test_unknown_sprite() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    h.renderer.destroy_sprite(a).unwrap();

    assert_eq!(h.draw_at(a, 0.0, 0.0), Err(SpriteRenderError::UnknownSprite(a)));
    assert_eq!(
        h.renderer.set_sprite_bounds(a, BoundingBox::IDENTITY),
        Err(SpriteRenderError::UnknownSprite(a))
    );
    let ghost = SpriteId::from_raw(99);
    assert!(h.renderer.sprite(ghost).is_err());
}

#[test]
fn test_destroyed_sprite_skipped_at_render() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.renderer.destroy_sprite(a).unwrap();

    let stats = h.renderer.render(false, Color::BLACK, 1).unwrap();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.skipped_batches, 1);
    assert_eq!(stats.instances, 0);
}

#[test]
fn test_last_frame_stats() {
    let mut h = Harness::small();
    let a = h.textured_sprite();
    h.draw_at(a, 0.0, 0.0).unwrap();
    h.draw_at(a, 0.0, 0.0).unwrap();

    let stats = h.renderer.render(true, Color::BLACK, 1).unwrap();
    assert_eq!(stats.tasks, 2);
    assert_eq!(h.renderer.last_frame_stats(), stats);
}

#[test]
fn test_invalid_config() {
    let mock = Arc::new(MockRenderContext::new());
    let result = SpriteRenderer::new(
        mock.clone(),
        RendererConfig::default().with_max_batches(0),
    );
    assert!(matches!(
        result,
        Err(SpriteRenderError::Config(ConfigError::Zero { field: "max_batches" }))
    ));
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_resources_allocated_up_front() {
    let mut h = Harness::small();
    let buffers = h.mock.count_buffer_creates();
    let a = h.textured_sprite();
    for _ in 0..3 {
        h.draw_at(a, 0.0, 0.0).unwrap();
        h.renderer.render(true, Color::BLACK, 1).unwrap();
    }
    assert_eq!(h.mock.count_buffer_creates(), buffers);
}

#[test]
fn test_reserved_batches_do_not_grow_during_frames() {
    let config = RendererConfig::default()
        .with_max_batches(2)
        .with_max_draws_per_batch(3)
        .with_max_instances(6)
        .with_worker_threads(2);

    let lazy = Harness::new(config.clone());
    assert_eq!(lazy.renderer.batches().reserved_requests(), 0);

    let mut h = Harness::new(config.with_reserved_batches(true));
    let reserved = h.renderer.batches().reserved_requests();
    assert!(reserved >= 6);

    let a = h.textured_sprite();
    let b = h.textured_sprite();
    for frame in 0..3 {
        for x in 0..3 {
            h.draw_at(a, x as f32, frame as f32).unwrap();
            h.draw_at(b, x as f32, frame as f32).unwrap();
        }
        h.renderer.render(true, Color::BLACK, 2).unwrap();
        assert_eq!(h.renderer.batches().reserved_requests(), reserved);
    }
}
