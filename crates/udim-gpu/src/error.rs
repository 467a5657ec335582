//! GPU error types.

use crate::texture::TextureId;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Texture creation failed.
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// Texture handle is unknown or already freed.
    #[error("Unknown texture: {0:?}")]
    UnknownTexture(TextureId),

    /// Upload region exceeds the texture bounds.
    #[error("Upload out of bounds: {0}")]
    OutOfBounds(String),

    /// Upload data too short for the requested region.
    #[error("Upload data too short: expected {expected} elements, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
