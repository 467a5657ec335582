//! Image identity and buffer selectors.

use crate::constants::VIEW_SLOT_COUNT;
use crate::coords::TileNumber;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of an image data-block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ImageId(pub u64);

impl ImageId {
    /// Allocate a process-unique identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Selects which buffer of an image is requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageUser {
    /// Tile to read; `None` selects the image's first tile.
    pub tile: Option<TileNumber>,
    /// Render pass index.
    pub pass: u16,
    /// Render layer index.
    pub layer: u16,
    /// Multi-view (stereo) index.
    pub view: u16,
}

impl ImageUser {
    /// User for a specific tile with default pass/layer/view.
    #[inline]
    pub const fn for_tile(tile: TileNumber) -> Self {
        Self {
            tile: Some(tile),
            pass: 0,
            layer: 0,
            view: 0,
        }
    }

    /// Same selector targeting another tile.
    #[inline]
    #[must_use]
    pub const fn with_tile(self, tile: TileNumber) -> Self {
        Self {
            tile: Some(tile),
            ..self
        }
    }

    /// Same selector targeting another view.
    #[inline]
    #[must_use]
    pub const fn with_view(self, view: u16) -> Self {
        Self { view, ..self }
    }

    /// Cache slot for this user's view.
    ///
    /// Only two views are cached; higher views share slot 0.
    #[inline]
    pub const fn view_slot(&self) -> u16 {
        if self.view >= VIEW_SLOT_COUNT {
            0
        } else {
            self.view
        }
    }
}
