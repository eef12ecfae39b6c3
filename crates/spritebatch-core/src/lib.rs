//! Spritebatch Core
//!
//! Shared building blocks for the sprite renderer: logging bootstrap, puffin
//! profiling, math re-exports, renderer configuration and the worker pool used
//! for parallel instance assembly.

pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;
pub mod task_pool;

pub use config::{ConfigError, RendererConfig};
pub use task_pool::TaskPool;
