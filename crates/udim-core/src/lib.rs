//! Core types, math, and error handling for the UDIM texture cache.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - UDIM tile numbers and pixel rectangles
//! - Image identity and image-user selectors
//! - Power-of-two and scaling helpers
//! - Common error types

pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{PixelRect, TileNumber};
pub use error::{Error, Result};
pub use types::{ImageId, ImageUser};

/// Workspace-wide constants
pub mod constants {
    /// Tile number of the first UDIM tile.
    pub const UDIM_BASE: u32 = 1001;
    /// Number of UDIM tiles per row in UV space.
    pub const UDIM_ROW_LENGTH: u32 = 10;
    /// Number of stereo view slots cached per image.
    pub const VIEW_SLOT_COUNT: u16 = 2;
    /// Bleed margin added around scaled partial updates.
    pub const SCALED_UPDATE_PADDING: i32 = 4;
}
