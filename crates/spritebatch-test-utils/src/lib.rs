//! GPU device seam for the spritebatch renderer.
//!
//! # Overview
//!
//! - [`RenderContext`] - Trait abstracting the GPU operations the renderer issues
//! - [`CommandList`] - Recorded commands submitted as one unit with a [`GpuFence`]
//! - GPU wrapper types (`GpuBuffer`, `GpuTexture`, ...) - Can be real or mock
//! - `MockRenderContext` - Recording implementation for tests (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use spritebatch_test_utils::{CommandList, MockRenderContext, RenderContext};
//!
//! let mock = MockRenderContext::new();
//! let fence = mock.create_fence();
//!
//! let mut commands = CommandList::new();
//! commands.draw_indexed(0..6, 0, 0..4);
//! mock.submit(&commands, &fence);
//! mock.wait_fence(&fence, None).unwrap();
//!
//! assert_eq!(mock.count_submits(), 1);
//! assert_eq!(mock.draw_calls()[0].instance_count(), 4);
//! # }
//! ```
//!
//! All wrapper types are owned and reference counted internally, so nothing
//! here carries a lifetime, and `RenderContext` is object safe so both real and
//! mock devices can sit behind `Arc<dyn RenderContext>`.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
