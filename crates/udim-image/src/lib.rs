//! Pixel buffers, colorspaces and color management.
//!
//! The texture cache treats everything in this crate as an external
//! collaborator: buffers are produced by a [`TileSource`], converted for
//! upload by a [`ColorManagement`] implementation, and resampled with
//! [`resample`] when the GPU copy is smaller than the source.

pub mod buffer;
pub mod color_management;
pub mod colorspace;
pub mod error;
pub mod resample;
pub mod source;

pub use buffer::{ImageBuffer, PixelData};
pub use color_management::{ColorManagement, StandardColorManagement};
pub use colorspace::ColorSpace;
pub use error::{ImageError, Result};
pub use resample::{resample_rgba_f32, resample_rgba_u8};
pub use source::{MemoryTileSource, TileLoader, TileSource};
