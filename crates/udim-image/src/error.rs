//! Image buffer error types.

use thiserror::Error;

/// Errors raised when constructing pixel buffers.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Zero width or height.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel data length does not match the dimensions.
    #[error("Pixel data length mismatch: expected {expected}, got {actual}")]
    DataLength { expected: usize, actual: usize },

    /// Channel count not supported for this pixel type.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u32),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ImageError>;
