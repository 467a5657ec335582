//! UDIM tile packing and GPU texture caching.
//!
//! This crate provides:
//! - A guillotine packer placing UDIM tiles into the layers of a texture array
//! - The tile mapping lookup texture shaders use to find a tile's layer and rectangle
//! - Upload of full tiles and dirty sub-regions, with downscaling
//! - A per-image texture cache with view slots, placeholders and deferred frees
//! - Time-based garbage collection of unused textures and pixel buffers

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod gc;
pub mod image;
pub mod mapping;
pub mod packer;
pub mod partial_update;
pub mod upload;

pub use builder::{ArrayBuild, BuiltArray, SingleBuild, TileArrayBuilder};
pub use cache::{
    AcquiredTexture, CacheSlot, CachedTexture, FreeMode, GpuTextures, TextureCache, TextureTarget,
};
pub use config::{GcConfig, TextureCacheConfig};
pub use error::{PackError, Result, TextureError};
pub use gc::{Clock, GcClock, GcContext, GcReport, GcSkip, ManualClock, SystemClock};
pub use image::{AlphaMode, Image, ImageFlags, ImageKind};
pub use mapping::{MappingEntry, MappingTexel, TileMapping, NO_TILE};
pub use packer::{PackRequest, PackedTileLayout, TilePacker, TilePlacement};
pub use partial_update::{DirtyRegion, PartialUpdateSync, SyncAction, SyncState};
