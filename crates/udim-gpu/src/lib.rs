//! GPU resource abstraction for the UDIM texture cache.
//!
//! This crate provides:
//! - The `GpuBackend` trait, the only GPU surface the cache touches
//! - Texture descriptors, formats and upload regions
//! - GPU capability reporting (resolution limits)
//! - Deferred texture freeing for non-owning threads
//! - A CPU reference backend used by tools and tests

pub mod backend;
pub mod capabilities;
pub mod deferred;
pub mod error;
pub mod software;
pub mod texture;

pub use backend::GpuBackend;
pub use capabilities::GpuCapabilities;
pub use deferred::DeferredFreeQueue;
pub use error::{GpuError, Result};
pub use software::{GpuCommand, SoftwareBackend};
pub use texture::{
    ExtendMode, TexelData, TexelUpload, TextureDesc, TextureDimension, TextureFormat, TextureId,
    UploadRegion,
};
