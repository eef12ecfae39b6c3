//! The sprite batch renderer.
//!
//! Draws are grouped by sprite as they are registered. `render` flattens the
//! groups into one instance array, uploads it through staging buffers and
//! issues one instanced draw per sprite against the shared unit quad.
//!
//! # Example
//!
//! ```rust,no_run
//! use spritebatch_core::RendererConfig;
//! use spritebatch_render::{
//!     BoundingBox, Color, Framebuffer, GraphicsContext, SamplerPreset, SpriteRenderer,
//!     SpriteTexture,
//! };
//! use glam::Vec2;
//!
//! let ctx = GraphicsContext::new_owned_sync().expect("no GPU available");
//! let framebuffer = Framebuffer::new(&*ctx, 256, 256, Framebuffer::DEFAULT_FORMAT);
//! let mut renderer = SpriteRenderer::new(ctx.clone(), RendererConfig::default()).unwrap();
//!
//! let texture = SpriteTexture::from_rgba8(&*ctx, 1, 1, &[255, 0, 0, 255]).unwrap();
//! let sprite = renderer.create_sprite();
//! renderer.set_sprite_texture(sprite, &texture).unwrap();
//!
//! renderer.set_sampler(&SamplerPreset::Linear.create(&*ctx));
//! renderer.set_camera(framebuffer.target(), Vec2::ZERO, 5.0, 0.1, 10.0);
//!
//! renderer
//!     .draw(sprite, Vec2::ZERO, Vec2::ONE, 0.0, BoundingBox::IDENTITY)
//!     .unwrap();
//! let stats = renderer.render(true, Color::CORNFLOWER_BLUE, 1000).unwrap();
//! assert_eq!(stats.draw_calls, 1);
//! ```

use std::sync::Arc;

use glam::Vec2;
use spritebatch_core::profiling::{profile_function, profile_scope};
use spritebatch_core::{RendererConfig, TaskPool};
use spritebatch_test_utils::{
    BindGroupDesc, BindGroupEntry, BindingResource, CommandList, GpuBindGroup, GpuBuffer,
    GpuFence, GpuSampler, RenderContext,
};

use crate::batch::{BatchTable, DrawRequest};
use crate::camera::{CAMERA_UNIFORM_SIZE, CameraState};
use crate::color::Color;
use crate::error::{Result, SpriteRenderError};
use crate::instance::{Assembly, InstanceRecord, assemble_parallel, assemble_single};
use crate::pipeline::{PipelineCache, groups};
use crate::quad::{QUAD_INDEX_COUNT, QUAD_INDEX_FORMAT, QuadMesh};
use crate::sprite::{BoundingBox, Sprite, SpriteId, SpriteTable, SpriteTexture};
use crate::target::RenderTarget;

/// What one `render` call submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Batches drawn.
    pub batches: usize,
    /// Instanced draw calls issued.
    pub draw_calls: usize,
    /// Instance records assembled and uploaded.
    pub instances: usize,
    /// Assembly tasks dispatched (0 when single-threaded).
    pub tasks: usize,
    /// Batches whose sprite lost its texture before the frame was rendered.
    pub skipped_batches: usize,
}

/// Batched, instanced 2D sprite renderer.
///
/// All storage is sized from [`RendererConfig`] when the renderer is created.
/// Each `render` is a full round trip with the device: it blocks until the
/// frame's fence signals.
pub struct SpriteRenderer {
    ctx: Arc<dyn RenderContext>,
    config: RendererConfig,

    sprites: SpriteTable,
    batches: BatchTable,
    /// Per-slot render readiness, decided once per frame before assembly.
    ready: Vec<bool>,
    instances: Vec<InstanceRecord>,
    instance_count: usize,

    camera: CameraState,
    target: Option<RenderTarget>,
    pipelines: PipelineCache,
    quad: QuadMesh,

    camera_staging: GpuBuffer,
    camera_buffer: GpuBuffer,
    instance_staging: GpuBuffer,
    instance_buffer: GpuBuffer,
    camera_bind_group: GpuBindGroup,
    instance_bind_group: GpuBindGroup,
    sampler_bind_group: Option<GpuBindGroup>,

    commands: CommandList,
    fence: GpuFence,
    pool: TaskPool,
    last_stats: FrameStats,
}

impl SpriteRenderer {
    /// Allocate every per-frame resource for `config`.
    pub fn new(ctx: Arc<dyn RenderContext>, config: RendererConfig) -> Result<Self> {
        profile_function!();
        config.validate()?;

        let device = ctx.as_ref();
        let pipelines = PipelineCache::new(device);
        let quad = QuadMesh::new(device);

        let instance_bytes = config.max_instances as u64 * InstanceRecord::SIZE;
        let camera_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_camera_staging"),
            size: CAMERA_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_camera_ubo"),
            size: CAMERA_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instance_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_instance_staging"),
            size: instance_bytes,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_instance_ssbo"),
            size: instance_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group = device.create_bind_group(&BindGroupDesc {
            label: Some("sprite_camera_bg"),
            layout: &pipelines.layouts().camera,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(camera_buffer.clone()),
            }],
        });
        let instance_bind_group = device.create_bind_group(&BindGroupDesc {
            label: Some("sprite_instances_bg"),
            layout: &pipelines.layouts().instances,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(instance_buffer.clone()),
            }],
        });

        let fence = device.create_fence();
        let pool = TaskPool::new(config.worker_threads);

        let mut batches = BatchTable::new(
            config.max_batches,
            config.max_draws_per_batch,
            config.max_instances,
        );
        if config.reserve_batches {
            batches.reserve_all();
        }

        tracing::debug!(
            "Sprite renderer created: {} batches x {} draws, {} instances, {} threads",
            config.max_batches,
            config.max_draws_per_batch,
            config.max_instances,
            config.worker_threads
        );

        Ok(Self {
            batches,
            ready: vec![false; config.max_batches],
            instances: vec![InstanceRecord::default(); config.max_instances],
            instance_count: 0,
            sprites: SpriteTable::new(),
            camera: CameraState::default(),
            target: None,
            pipelines,
            quad,
            camera_staging,
            camera_buffer,
            instance_staging,
            instance_buffer,
            camera_bind_group,
            instance_bind_group,
            sampler_bind_group: None,
            commands: CommandList::with_capacity(16),
            fence,
            pool,
            last_stats: FrameStats::default(),
            config,
            ctx,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    /// Batches registered since the last `render`.
    pub fn batches(&self) -> &BatchTable {
        &self.batches
    }

    /// Instance records assembled by the last `render`.
    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances[..self.instance_count]
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    // Sprites

    /// Create a sprite with no texture and identity bounds.
    pub fn create_sprite(&mut self) -> SpriteId {
        self.sprites.create()
    }

    /// Draws already registered for the sprite this frame are skipped at render.
    pub fn destroy_sprite(&mut self, id: SpriteId) -> Result<()> {
        self.sprites.destroy(id)
    }

    pub fn sprite(&self, id: SpriteId) -> Result<&Sprite> {
        self.sprites.get(id)
    }

    /// Point the sprite at `texture`, building a new bind group for it.
    pub fn set_sprite_texture(&mut self, id: SpriteId, texture: &Arc<SpriteTexture>) -> Result<()> {
        let layout = &self.pipelines.layouts().texture;
        self.sprites
            .get_mut(id)?
            .set_texture(self.ctx.as_ref(), layout, texture);
        Ok(())
    }

    pub fn clear_sprite_texture(&mut self, id: SpriteId) -> Result<()> {
        self.sprites.get_mut(id)?.clear_texture();
        Ok(())
    }

    /// Default UV window used by [`SpriteRenderer::draw_sprite`].
    pub fn set_sprite_bounds(&mut self, id: SpriteId, bounds: BoundingBox) -> Result<()> {
        self.sprites.get_mut(id)?.set_bounds(bounds);
        Ok(())
    }

    // Frame setup

    /// Sampler used for every sprite texture from the next frame on.
    pub fn set_sampler(&mut self, sampler: &GpuSampler) {
        self.sampler_bind_group = Some(self.ctx.create_bind_group(&BindGroupDesc {
            label: Some("sprite_sampler_bg"),
            layout: &self.pipelines.layouts().sampler,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Sampler(sampler.clone()),
            }],
        }));
        tracing::debug!("Sprite sampler updated");
    }

    /// Replace the camera and the target it renders into.
    ///
    /// The aspect ratio comes from the target. The pipeline is rebuilt on the
    /// next `render` only if the target differs from the last one.
    pub fn set_camera(
        &mut self,
        target: &RenderTarget,
        position: Vec2,
        ortho_half_height: f32,
        near: f32,
        far: f32,
    ) {
        self.camera = CameraState::new(
            position,
            ortho_half_height,
            target.aspect_ratio(),
            near,
            far,
        );
        self.target = Some(target.clone());
        tracing::debug!(
            "Camera at {} (half height {}) targeting {}x{}",
            position,
            ortho_half_height,
            target.width(),
            target.height()
        );
    }

    // Draw registration

    /// Queue one draw of `sprite`.
    ///
    /// Draws of a sprite without a live texture are dropped without error.
    pub fn draw(
        &mut self,
        sprite: SpriteId,
        position: Vec2,
        scale: Vec2,
        rotation: f32,
        bounds: BoundingBox,
    ) -> Result<()> {
        if !self.accepts_draws(sprite)? {
            return Ok(());
        }
        self.batches.register(
            sprite,
            DrawRequest::new(position, scale, rotation, bounds),
        )
    }

    /// Queue one draw using the sprite's default bounds.
    pub fn draw_sprite(
        &mut self,
        sprite: SpriteId,
        position: Vec2,
        scale: Vec2,
        rotation: f32,
    ) -> Result<()> {
        let bounds = self.sprites.get(sprite)?.bounds();
        self.draw(sprite, position, scale, rotation, bounds)
    }

    /// Queue one draw per index of the parallel arrays, in order.
    ///
    /// Either every draw is registered or none is.
    pub fn draw_grouped(
        &mut self,
        sprite: SpriteId,
        positions: &[Vec2],
        scales: &[Vec2],
        rotations: &[f32],
        bounds: &[BoundingBox],
    ) -> Result<()> {
        let count = positions.len();
        if scales.len() != count || rotations.len() != count || bounds.len() != count {
            return Err(SpriteRenderError::MismatchedLengths {
                positions: count,
                scales: scales.len(),
                rotations: rotations.len(),
                bounds: bounds.len(),
            });
        }
        if !self.accepts_draws(sprite)? {
            return Ok(());
        }

        let requests = positions
            .iter()
            .zip(scales)
            .zip(rotations)
            .zip(bounds)
            .map(|(((&position, &scale), &rotation), &bounds)| {
                DrawRequest::new(position, scale, rotation, bounds)
            });
        self.batches.register_with(sprite, requests)
    }

    fn accepts_draws(&self, sprite: SpriteId) -> Result<bool> {
        let ready = self.sprites.get(sprite)?.is_render_ready();
        if !ready {
            tracing::trace!("Dropping draw of {:?}: no texture", sprite);
        }
        Ok(ready)
    }

    // Submission

    /// Assemble, upload and draw everything registered this frame.
    ///
    /// With `multithreaded` set, each batch is split into chunks of at most
    /// `chunk_size` draws that are assembled on the worker pool. Blocks until
    /// the device has finished the frame, then clears all batches.
    ///
    /// Missing camera or sampler, a zero chunk size and instance overflow are
    /// reported before anything is recorded and leave this frame's draws in
    /// place.
    pub fn render(
        &mut self,
        multithreaded: bool,
        clear_color: Color,
        chunk_size: usize,
    ) -> Result<FrameStats> {
        profile_function!();

        let Some(target) = self.target.as_ref() else {
            return Err(SpriteRenderError::NoRenderTarget);
        };
        let Some(sampler_bind_group) = self.sampler_bind_group.as_ref() else {
            return Err(SpriteRenderError::NoSampler);
        };
        if multithreaded && chunk_size == 0 {
            return Err(SpriteRenderError::InvalidChunkSize);
        }
        if self.batches.draw_count() > self.instances.len() {
            return Err(SpriteRenderError::InstanceLimitExceeded {
                requested: self.batches.draw_count(),
                capacity: self.instances.len(),
            });
        }

        let ctx = self.ctx.as_ref();
        self.pipelines.ensure(ctx, target);
        let Some(pipeline) = self.pipelines.pipeline() else {
            return Err(SpriteRenderError::NoRenderTarget);
        };

        let camera = self.camera.uniform(self.pipelines.unclipped_depth());
        ctx.write_buffer(&self.camera_staging, 0, bytemuck::bytes_of(&camera));

        // A texture may be released by its owner at any point from here on.
        // Assembly and draws must agree on which batches take part.
        mark_ready(&self.sprites, &self.batches, &mut self.ready);

        let assembly = {
            profile_scope!("assemble_instances");
            let ready = ready_batches(&self.sprites, &self.batches, &self.ready)
                .map(|(_, requests)| requests);
            if multithreaded {
                assemble_parallel(&self.pool, ready, &mut self.instances, chunk_size)
            } else {
                assemble_single(ready, &mut self.instances)
            }
        };
        self.instance_count = assembly.instances;

        if assembly.instances > 0 {
            ctx.write_buffer(
                &self.instance_staging,
                0,
                bytemuck::cast_slice(&self.instances[..assembly.instances]),
            );
        }

        let mut stats = {
            profile_scope!("record_commands");
            let commands = &mut self.commands;
            commands.clear();
            commands.copy_buffer_to_buffer(
                &self.camera_staging,
                0,
                &self.camera_buffer,
                0,
                CAMERA_UNIFORM_SIZE,
            );
            if assembly.instances > 0 {
                commands.copy_buffer_to_buffer(
                    &self.instance_staging,
                    0,
                    &self.instance_buffer,
                    0,
                    assembly.instances as u64 * InstanceRecord::SIZE,
                );
            }

            commands.begin_render_pass(target.view(), clear_color.to_wgpu());
            commands.set_pipeline(pipeline);
            commands.set_vertex_buffer(0, self.quad.vertex_buffer());
            commands.set_index_buffer(self.quad.index_buffer(), QUAD_INDEX_FORMAT);
            commands.set_bind_group(groups::CAMERA, &self.camera_bind_group);
            commands.set_bind_group(groups::INSTANCES, &self.instance_bind_group);
            commands.set_bind_group(groups::SAMPLER, sampler_bind_group);

            let mut base = 0u32;
            let mut drawn = 0;
            for (texture, requests) in ready_batches(&self.sprites, &self.batches, &self.ready) {
                let count = requests.len() as u32;
                commands.set_bind_group(groups::TEXTURE, texture);
                commands.draw_indexed(0..QUAD_INDEX_COUNT, 0, base..base + count);
                base += count;
                drawn += 1;
            }
            commands.end_render_pass();

            frame_stats(&assembly, drawn, self.batches.active_count())
        };

        let waited = {
            profile_scope!("submit_and_wait");
            ctx.submit(&self.commands, &self.fence);
            let waited = ctx.wait_fence(&self.fence, self.config.fence_timeout);
            ctx.reset_fence(&self.fence);
            waited
        };
        self.batches.reset();

        if let Err(e) = waited {
            tracing::error!("Sprite frame did not complete: {}", e);
            return Err(e.into());
        }

        if stats.skipped_batches > 0 {
            tracing::trace!("Skipped {} batches without texture", stats.skipped_batches);
        }
        stats.draw_calls = self.commands.draw_count();
        tracing::trace!(
            "Sprite frame: {} draws, {} instances, {} tasks",
            stats.draw_calls,
            stats.instances,
            stats.tasks
        );
        self.last_stats = stats;
        Ok(stats)
    }
}

impl std::fmt::Debug for SpriteRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteRenderer")
            .field("config", &self.config)
            .field("sprites", &self.sprites.len())
            .field("active_batches", &self.batches.active_count())
            .field("draw_count", &self.batches.draw_count())
            .field("camera", &self.camera)
            .field("last_stats", &self.last_stats)
            .finish_non_exhaustive()
    }
}

/// Record, per active slot, whether its sprite exists and still has a live
/// texture.
fn mark_ready(sprites: &SpriteTable, batches: &BatchTable, ready: &mut [bool]) {
    for (flag, batch) in ready.iter_mut().zip(batches.active()) {
        *flag = batch
            .sprite()
            .and_then(|id| sprites.get(id).ok())
            .is_some_and(Sprite::is_render_ready);
    }
}

/// Active batches marked ready by [`mark_ready`], with their texture's bind
/// group, in slot order.
///
/// The bind group keeps the texture view alive, so the result does not change
/// when a texture is released after marking.
fn ready_batches<'a>(
    sprites: &'a SpriteTable,
    batches: &'a BatchTable,
    ready: &'a [bool],
) -> impl Iterator<Item = (&'a GpuBindGroup, &'a [DrawRequest])> + Clone + Send + 'a {
    batches
        .active()
        .iter()
        .zip(ready)
        .filter(|(_, ready)| **ready)
        .filter_map(move |(batch, _)| {
            let sprite = sprites.get(batch.sprite()?).ok()?;
            Some((sprite.bind_group()?, batch.requests()))
        })
}

fn frame_stats(assembly: &Assembly, drawn: usize, active: usize) -> FrameStats {
    FrameStats {
        batches: drawn,
        draw_calls: drawn,
        instances: assembly.instances,
        tasks: assembly.tasks,
        skipped_batches: active - drawn,
    }
}
