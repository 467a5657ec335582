//! Texture cache error types.

use thiserror::Error;
use udim_core::TileNumber;
use udim_gpu::GpuError;

/// Errors raised by the tile packer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    /// No tile was given.
    #[error("No tiles to pack")]
    Empty,

    /// A single tile is larger than the layer extent.
    #[error("Tile {tile} ({width}x{height}) does not fit a {layer_width}x{layer_height} layer")]
    TileTooLarge {
        tile: TileNumber,
        width: u32,
        height: u32,
        layer_width: u32,
        layer_height: u32,
    },
}

/// Errors surfaced by the texture cache.
///
/// Missing pixel data and packing failures are resolved with placeholder
/// textures; only backend failures reach the caller.
#[derive(Error, Debug)]
pub enum TextureError {
    /// GPU backend error.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// Packing error.
    #[error("Packing error: {0}")]
    Pack(#[from] PackError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, TextureError>;
