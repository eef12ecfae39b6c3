//! Headless sprite batching example.
//!
//! This example shows how to:
//! - Create sprite textures from procedurally generated pixels
//! - Register draws for several sprites in one frame
//! - Render into an offscreen framebuffer with multithreaded assembly
//!
//! Two sprites are drawn as overlapping crosses of five quads each; the other
//! three are drawn along the bottom edge.

use glam::Vec2;
use spritebatch_core::profiling::{new_frame, profile_scope};
use spritebatch_core::{RendererConfig, logging};
use spritebatch_render::{
    BoundingBox, Color, Framebuffer, GraphicsContext, SamplerPreset, SpriteRenderer,
    SpriteTexture,
};

const TEXTURE_SIZE: u32 = 32;
const FRAMES: usize = 3;

/// Checkerboard of `color` and transparent cells, `cell` pixels wide.
fn checkerboard(color: [u8; 4], cell: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((TEXTURE_SIZE * TEXTURE_SIZE * 4) as usize);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if on { &color } else { &[0, 0, 0, 0] });
        }
    }
    pixels
}

fn main() {
    logging::init();

    let ctx = match GraphicsContext::new_owned_sync() {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("Cannot run without a GPU: {}", e);
            return;
        }
    };

    let framebuffer = Framebuffer::new(&*ctx, 1024, 1024, Framebuffer::DEFAULT_FORMAT);
    let mut renderer = match SpriteRenderer::new(ctx.clone(), RendererConfig::default()) {
        Ok(renderer) => renderer,
        Err(e) => {
            tracing::error!("Failed to create sprite renderer: {}", e);
            return;
        }
    };

    let palette = [
        Color::from_hex(0xE63946),
        Color::from_hex(0xF1FAEE),
        Color::from_hex(0xA8DADC),
        Color::from_hex(0x457B9D),
        Color::from_hex(0xFFB703),
    ];
    let mut textures = Vec::with_capacity(palette.len());
    let mut sprites = Vec::with_capacity(palette.len());
    for (i, color) in palette.iter().enumerate() {
        let pixels = checkerboard(color.to_rgba8(), 4 << (i % 3));
        let texture = SpriteTexture::from_rgba8(&*ctx, TEXTURE_SIZE, TEXTURE_SIZE, &pixels)
            .expect("checkerboard has the texture's size");
        let sprite = renderer.create_sprite();
        renderer
            .set_sprite_texture(sprite, &texture)
            .expect("sprite was just created");
        textures.push(texture);
        sprites.push(sprite);
    }

    renderer.set_sampler(&SamplerPreset::Linear.create(&*ctx));
    renderer.set_camera(framebuffer.target(), Vec2::ZERO, 5.0, 0.1, 10.0);

    let cross = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(-1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(0.0, -1.0),
    ];

    for frame in 0..FRAMES {
        new_frame();
        profile_scope!("frame");

        let spin = frame as f32 * 0.25;
        for offset in cross {
            renderer
                .draw(sprites[0], offset, Vec2::ONE, 0.0, BoundingBox::IDENTITY)
                .expect("within capacity");
        }
        let scales = [Vec2::ONE; 5];
        let rotations = [spin; 5];
        let bounds = [BoundingBox::IDENTITY; 5];
        let half_cross = cross.map(|offset| offset * 0.5);
        renderer
            .draw_grouped(sprites[1], &half_cross, &scales, &rotations, &bounds)
            .expect("within capacity");

        for (i, &sprite) in sprites[2..].iter().enumerate() {
            let x = (i as f32 - 1.0) * 3.0;
            renderer
                .draw_sprite(sprite, Vec2::new(x, -4.0), Vec2::splat(0.75), -spin)
                .expect("within capacity");
        }

        match renderer.render(true, Color::CORNFLOWER_BLUE, 1000) {
            Ok(stats) => tracing::info!(
                "Frame {}: {} draw calls, {} instances, {} tasks",
                frame,
                stats.draw_calls,
                stats.instances,
                stats.tasks
            ),
            Err(e) => {
                tracing::error!("Frame {} failed: {}", frame, e);
                return;
            }
        }
    }
}
