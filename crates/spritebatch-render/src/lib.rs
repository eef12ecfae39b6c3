//! Spritebatch Render
//!
//! Instanced 2D sprite rendering on wgpu. Draws are grouped by sprite as they
//! are registered, flattened into one instance buffer per frame (optionally on
//! worker threads) and drawn with one instanced call per sprite.
//!
//! All GPU access goes through [`spritebatch_test_utils::RenderContext`], so
//! the renderer runs against [`GraphicsContext`] or a mock device alike.

pub mod batch;
pub mod camera;
pub mod color;
pub mod context;
mod context_impl;
pub mod error;
pub mod framebuffer;
pub mod instance;
pub mod pipeline;
pub mod quad;
pub mod renderer;
pub mod sampler;
pub mod sprite;
pub mod target;

pub use batch::{Batch, BatchTable, DrawRequest};
pub use camera::{CameraState, CameraUniform};
pub use color::Color;
pub use context::{GraphicsContext, GraphicsContextDescriptor, GraphicsError};
pub use error::{Result, SpriteRenderError};
pub use framebuffer::Framebuffer;
pub use instance::InstanceRecord;
pub use renderer::{FrameStats, SpriteRenderer};
pub use sampler::SamplerPreset;
pub use sprite::{BoundingBox, Sprite, SpriteId, SpriteTexture};
pub use target::{RenderTarget, TargetId};
