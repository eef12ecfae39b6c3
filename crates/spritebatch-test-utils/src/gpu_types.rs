//! GPU resource wrappers that can be real or mock.
//!
//! Every wrapper is owned and cheap to clone (wgpu handles are reference
//! counted), so renderer state never carries lifetimes. With the `mock`
//! feature each wrapper can also hold a numbered stand-in that
//! `MockRenderContext` hands out.

use parking_lot::Mutex;
use std::sync::Arc;

/// Wrapper around a GPU buffer that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    inner: GpuBufferInner,
}

#[derive(Clone, Debug)]
enum GpuBufferInner {
    Real(wgpu::Buffer),
    #[cfg(feature = "mock")]
    Mock { id: usize, size: u64 },
}

impl GpuBuffer {
    pub fn from_wgpu(buffer: wgpu::Buffer) -> Self {
        Self {
            inner: GpuBufferInner::Real(buffer),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, size: u64) -> Self {
        Self {
            inner: GpuBufferInner::Mock { id, size },
        }
    }

    /// Size of the buffer in bytes.
    pub fn size(&self) -> u64 {
        match &self.inner {
            GpuBufferInner::Real(buffer) => buffer.size(),
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { size, .. } => *size,
        }
    }

    /// Get the underlying wgpu::Buffer.
    ///
    /// # Panics
    /// Panics if this is a mock buffer.
    pub fn as_wgpu(&self) -> &wgpu::Buffer {
        match &self.inner {
            GpuBufferInner::Real(buffer) => buffer,
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Buffer from mock buffer - this is a test-only buffer")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuBufferInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuBufferInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around a 2D GPU texture that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    inner: GpuTextureInner,
}

#[derive(Clone, Debug)]
enum GpuTextureInner {
    Real(wgpu::Texture),
    #[cfg(feature = "mock")]
    Mock {
        id: usize,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    },
}

impl GpuTexture {
    pub fn from_wgpu(texture: wgpu::Texture) -> Self {
        Self {
            inner: GpuTextureInner::Real(texture),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            inner: GpuTextureInner::Mock {
                id,
                width,
                height,
                format,
            },
        }
    }

    /// Width and height in texels.
    pub fn size(&self) -> (u32, u32) {
        match &self.inner {
            GpuTextureInner::Real(texture) => (texture.width(), texture.height()),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { width, height, .. } => (*width, *height),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture.format(),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { format, .. } => *format,
        }
    }

    /// # Panics
    /// Panics if this is a mock texture.
    pub fn as_wgpu(&self) -> &wgpu::Texture {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture,
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Texture from mock texture - this is a test-only texture")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuTextureInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuTextureInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Declares an id-only wrapper around a wgpu handle.
macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident, $inner:ident, $wgpu:ty) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name {
            inner: $inner,
        }

        #[derive(Clone, Debug)]
        enum $inner {
            Real($wgpu),
            #[cfg(feature = "mock")]
            Mock { id: usize },
        }

        impl $name {
            pub fn from_wgpu(handle: $wgpu) -> Self {
                Self {
                    inner: $inner::Real(handle),
                }
            }

            #[cfg(feature = "mock")]
            pub fn mock(id: usize) -> Self {
                Self {
                    inner: $inner::Mock { id },
                }
            }

            /// # Panics
            /// Panics if this is a mock handle.
            pub fn as_wgpu(&self) -> &$wgpu {
                match &self.inner {
                    $inner::Real(handle) => handle,
                    #[cfg(feature = "mock")]
                    $inner::Mock { .. } => panic!(
                        "Attempted to get {} from a mock handle - this is a test-only resource",
                        stringify!($wgpu)
                    ),
                }
            }

            #[cfg(feature = "mock")]
            pub fn is_mock(&self) -> bool {
                matches!(self.inner, $inner::Mock { .. })
            }

            #[cfg(feature = "mock")]
            pub fn mock_id(&self) -> Option<usize> {
                match &self.inner {
                    $inner::Mock { id } => Some(*id),
                    _ => None,
                }
            }
        }
    };
}

gpu_handle!(
    /// Wrapper around a texture view, the unit bound to bind groups and render passes.
    GpuTextureView,
    GpuTextureViewInner,
    wgpu::TextureView
);
gpu_handle!(GpuSampler, GpuSamplerInner, wgpu::Sampler);
gpu_handle!(GpuShaderModule, GpuShaderModuleInner, wgpu::ShaderModule);
gpu_handle!(GpuRenderPipeline, GpuRenderPipelineInner, wgpu::RenderPipeline);
gpu_handle!(GpuBindGroupLayout, GpuBindGroupLayoutInner, wgpu::BindGroupLayout);
gpu_handle!(GpuBindGroup, GpuBindGroupInner, wgpu::BindGroup);

/// Lifecycle of a [`GpuFence`].
#[derive(Clone, Debug, Default)]
pub enum FenceState {
    /// Nothing submitted since creation or the last reset.
    #[default]
    Unsignaled,
    /// Work was submitted; real devices keep the submission to wait on.
    Submitted(Option<wgpu::SubmissionIndex>),
    /// The submitted work finished.
    Signaled,
}

/// CPU-side fence tracking one submission at a time.
///
/// wgpu has no fence object, so the fence remembers the submission index of
/// the command list it was attached to and the device polls for it.
#[derive(Clone, Debug, Default)]
pub struct GpuFence {
    state: Arc<Mutex<FenceState>>,
}

impl GpuFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FenceState {
        self.state.lock().clone()
    }

    pub fn mark_submitted(&self, submission: Option<wgpu::SubmissionIndex>) {
        *self.state.lock() = FenceState::Submitted(submission);
    }

    pub fn signal(&self) {
        *self.state.lock() = FenceState::Signaled;
    }

    pub fn reset(&self) {
        *self.state.lock() = FenceState::Unsignaled;
    }

    pub fn is_signaled(&self) -> bool {
        matches!(*self.state.lock(), FenceState::Signaled)
    }
}
