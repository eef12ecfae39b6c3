use spritebatch_core::ConfigError;
use spritebatch_test_utils::DeviceError;

use crate::sprite::SpriteId;

/// Errors returned by [`SpriteRenderer`](crate::SpriteRenderer).
///
/// Capacity and configuration errors are raised before any batch or instance
/// state changes, so the call can be retried with a smaller request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpriteRenderError {
    #[error("frame draw limit of {limit} reached")]
    DrawLimitExceeded { limit: usize },
    #[error("batch for {sprite:?} is full ({capacity} draws)")]
    BatchFull { sprite: SpriteId, capacity: usize },
    #[error("all {limit} batch slots are in use this frame")]
    BatchLimitExceeded { limit: usize },
    #[error("{requested} instances requested but the instance buffer holds {capacity}")]
    InstanceLimitExceeded { requested: usize, capacity: usize },
    #[error(
        "grouped draw arrays differ in length (positions {positions}, scales {scales}, rotations {rotations}, bounds {bounds})"
    )]
    MismatchedLengths {
        positions: usize,
        scales: usize,
        rotations: usize,
        bounds: usize,
    },
    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },
    #[error("unknown sprite {0:?}")]
    UnknownSprite(SpriteId),
    #[error("no render target set; call set_camera first")]
    NoRenderTarget,
    #[error("no sampler set; call set_sampler first")]
    NoSampler,
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
    #[error("invalid renderer config: {0}")]
    Config(#[from] ConfigError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

pub type Result<T, E = SpriteRenderError> = std::result::Result<T, E>;
