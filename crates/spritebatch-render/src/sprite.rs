//! Sprites: a texture, its bind group, and a default UV window.
//!
//! Sprites live in the renderer's [`SpriteTable`] and are addressed by
//! [`SpriteId`], which is also the key batches are grouped by.

use std::sync::{Arc, Weak};

use glam::Vec2;
use spritebatch_test_utils::{
    BindGroupDesc, BindGroupEntry, BindingResource, GpuBindGroup, GpuBindGroupLayout, GpuTexture,
    GpuTextureView, RenderContext,
};

use crate::error::{Result, SpriteRenderError};

/// Opaque handle to a sprite owned by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(u32);

impl SpriteId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// UV rectangle in unit texture space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BoundingBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoundingBox {
    /// The whole texture, [0,0] to [1,1].
    pub const IDENTITY: BoundingBox = BoundingBox {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// UV window of one cell in a uniform grid of `columns` x `rows`.
    ///
    /// Cells are addressed left-to-right, top-to-bottom.
    pub fn grid_cell(columns: u32, rows: u32, column: u32, row: u32) -> Self {
        let cell = Vec2::new(1.0 / columns.max(1) as f32, 1.0 / rows.max(1) as f32);
        let min = Vec2::new(column as f32, row as f32) * cell;
        Self { min, max: min + cell }
    }

    /// UV window of a pixel rectangle inside a texture of the given size.
    pub fn from_pixels(x: u32, y: u32, width: u32, height: u32, texture_width: u32, texture_height: u32) -> Self {
        let size = Vec2::new(texture_width.max(1) as f32, texture_height.max(1) as f32);
        let origin = Vec2::new(x as f32, y as f32);
        let extent = Vec2::new(width as f32, height as f32);
        Self {
            min: origin / size,
            max: (origin + extent) / size,
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A texture sprites can sample from.
///
/// Owned by the caller through an `Arc`; sprites only keep a weak reference.
#[derive(Debug)]
pub struct SpriteTexture {
    texture: GpuTexture,
    view: GpuTextureView,
}

impl SpriteTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Upload tightly packed RGBA8 pixels into a new texture.
    pub fn from_rgba8(ctx: &dyn RenderContext, width: u32, height: u32, pixels: &[u8]) -> Result<Arc<Self>> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected || expected == 0 {
            return Err(SpriteRenderError::InvalidTextureData {
                expected,
                actual: pixels.len(),
            });
        }

        let texture = ctx.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprite_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.write_texture(&texture, pixels, width * 4);
        let view = ctx.create_texture_view(&texture);

        Ok(Arc::new(Self { texture, view }))
    }

    /// Wrap a texture created elsewhere.
    pub fn from_parts(texture: GpuTexture, view: GpuTextureView) -> Arc<Self> {
        Arc::new(Self { texture, view })
    }

    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    pub fn view(&self) -> &GpuTextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        self.texture.size()
    }
}

/// A drawable sprite.
#[derive(Debug, Default)]
pub struct Sprite {
    texture: Weak<SpriteTexture>,
    bind_group: Option<GpuBindGroup>,
    bounds: BoundingBox,
}

impl Sprite {
    /// True once a texture is assigned and still alive.
    pub fn is_render_ready(&self) -> bool {
        self.bind_group.is_some() && self.texture.strong_count() > 0
    }

    pub fn texture(&self) -> Option<Arc<SpriteTexture>> {
        self.texture.upgrade()
    }

    pub fn bind_group(&self) -> Option<&GpuBindGroup> {
        self.bind_group.as_ref()
    }

    /// Default UV window used by `draw_sprite`.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub(crate) fn set_bounds(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
    }

    /// Point the sprite at `texture` and build a fresh bind group for it.
    pub(crate) fn set_texture(
        &mut self,
        ctx: &dyn RenderContext,
        layout: &GpuBindGroupLayout,
        texture: &Arc<SpriteTexture>,
    ) {
        self.bind_group = Some(ctx.create_bind_group(&BindGroupDesc {
            label: Some("sprite_texture_bg"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(texture.view().clone()),
            }],
        }));
        self.texture = Arc::downgrade(texture);
    }

    pub(crate) fn clear_texture(&mut self) {
        self.texture = Weak::new();
        self.bind_group = None;
    }
}

/// Slot storage for sprites. Ids are never reused, so a destroyed sprite's id
/// stays invalid.
#[derive(Debug, Default)]
pub struct SpriteTable {
    slots: Vec<Option<Sprite>>,
}

impl SpriteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> SpriteId {
        let id = SpriteId(self.slots.len() as u32);
        self.slots.push(Some(Sprite::default()));
        id
    }

    /// Drop the sprite and its bind group.
    pub fn destroy(&mut self, id: SpriteId) -> Result<()> {
        match self.slots.get_mut(id.index()) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(SpriteRenderError::UnknownSprite(id)),
        }
    }

    pub fn get(&self, id: SpriteId) -> Result<&Sprite> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SpriteRenderError::UnknownSprite(id))
    }

    pub fn get_mut(&mut self, id: SpriteId) -> Result<&mut Sprite> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SpriteRenderError::UnknownSprite(id))
    }

    /// Number of live sprites.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
