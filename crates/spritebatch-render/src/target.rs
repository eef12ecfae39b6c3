//! Output surfaces the renderer draws into.

use spritebatch_test_utils::GpuTextureView;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a render target, stable across view swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A colour attachment plus the description the pipeline must match.
///
/// Window surfaces hand out a new texture view every frame; use
/// [`RenderTarget::with_view`] so the target keeps its identity and the
/// renderer keeps its pipeline.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    id: TargetId,
    view: GpuTextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(view: GpuTextureView, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            id: TargetId::next(),
            view,
            format,
            width,
            height,
        }
    }

    /// Same target, next frame's view.
    pub fn with_view(&self, view: GpuTextureView) -> Self {
        Self {
            view,
            ..self.clone()
        }
    }

    /// Same target after a resize.
    pub fn resized(&self, view: GpuTextureView, width: u32, height: u32) -> Self {
        Self {
            view,
            width,
            height,
            ..self.clone()
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn view(&self) -> &GpuTextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height. A zero-height (minimized) target reports 1.0.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
