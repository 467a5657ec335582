//! Tile numbering and pixel-space rectangles.

use crate::constants::{UDIM_BASE, UDIM_ROW_LENGTH};
use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, UVec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// UDIM tile number (1001, 1002, ...).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct TileNumber(pub u32);

impl TileNumber {
    /// The first UDIM tile.
    pub const FIRST: Self = Self(UDIM_BASE);

    /// Create a tile number, rejecting values below the UDIM base.
    pub fn new(number: u32) -> Result<Self> {
        if number < UDIM_BASE {
            return Err(Error::InvalidTile(number));
        }
        Ok(Self(number))
    }

    /// Tile number for a zero-based index.
    #[inline]
    pub const fn from_index(index: u32) -> Self {
        Self(UDIM_BASE + index)
    }

    /// Tile number for the UV cell `(u, v)`.
    #[inline]
    pub const fn from_uv(u: u32, v: u32) -> Self {
        debug_assert!(u < UDIM_ROW_LENGTH);
        Self(UDIM_BASE + u + v * UDIM_ROW_LENGTH)
    }

    /// Zero-based index (`number - 1001`).
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 - UDIM_BASE
    }

    /// UV cell of this tile.
    #[inline]
    pub const fn uv(self) -> (u32, u32) {
        let index = self.index();
        (index % UDIM_ROW_LENGTH, index / UDIM_ROW_LENGTH)
    }
}

impl Default for TileNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for TileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open integer rectangle `[xmin, xmax) x [ymin, ymax)` in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl PixelRect {
    /// Create a rectangle from its corners.
    #[inline]
    pub const fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Rectangle covering a whole `width x height` buffer.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    /// Lower corner.
    #[inline]
    pub const fn origin(&self) -> IVec2 {
        IVec2::new(self.xmin, self.ymin)
    }

    /// Size, zero for empty rectangles.
    #[inline]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width().max(0) as u32, self.height().max(0) as u32)
    }

    /// True if the rectangle covers no pixel.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    /// Intersection of two rectangles, `None` if they do not overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let rect = Self::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        (!rect.is_empty()).then_some(rect)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }

    /// Clip to a `width x height` buffer.
    pub fn clamp_to_size(&self, width: u32, height: u32) -> Option<Self> {
        self.intersect(&Self::from_size(width, height))
    }

    /// Grow by `padding` on every side, clamped to a `width x height` buffer.
    pub fn padded(&self, padding: i32, width: u32, height: u32) -> Self {
        Self::new(
            (self.xmin - padding).max(0),
            (self.ymin - padding).max(0),
            (self.xmax + padding).min(width as i32),
            (self.ymax + padding).min(height as i32),
        )
    }

    /// True if both rectangles share at least one pixel.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }

    /// True if this rectangle covers the whole `width x height` buffer.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.xmin <= 0 && self.ymin <= 0 && self.xmax >= width as i32 && self.ymax >= height as i32
    }
}
