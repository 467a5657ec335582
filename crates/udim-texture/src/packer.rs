//! Packing of UDIM tiles into the layers of an array texture.
//!
//! Tiles are sorted by a score favoring large and elongated tiles, then
//! placed with a guillotine packer: free space is kept as a list of
//! rectangles, and each placement splits the space it lands in. One packing
//! pass fills one layer; passes repeat until every tile is placed.

use crate::error::PackError;
use glam::UVec2;
use std::collections::BTreeMap;
use udim_core::math::limit_size;
use udim_core::{PixelRect, TileNumber};

/// A tile to pack with its native size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackRequest {
    pub tile: TileNumber,
    pub width: u32,
    pub height: u32,
}

impl PackRequest {
    pub const fn new(tile: TileNumber, width: u32, height: u32) -> Self {
        Self {
            tile,
            width,
            height,
        }
    }
}

/// Where a tile lives in the array texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TilePlacement {
    pub layer: u32,
    /// Texel offset within the layer.
    pub offset: UVec2,
    /// Packed size, possibly downscaled from the native size.
    pub size: UVec2,
}

impl TilePlacement {
    /// Covered texels within the layer.
    pub fn rect(&self) -> PixelRect {
        PixelRect::from_origin_size(
            self.offset.x as i32,
            self.offset.y as i32,
            self.size.x as i32,
            self.size.y as i32,
        )
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size.x == 0 || self.size.y == 0
    }
}

/// Result of packing: array dimensions plus one placement per tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedTileLayout {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    placements: BTreeMap<TileNumber, TilePlacement>,
}

impl PackedTileLayout {
    pub fn placement(&self, tile: TileNumber) -> Option<&TilePlacement> {
        self.placements.get(&tile)
    }

    /// Placements in ascending tile order.
    pub fn iter(&self) -> impl Iterator<Item = (TileNumber, &TilePlacement)> {
        self.placements.iter().map(|(tile, placement)| (*tile, placement))
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Highest packed tile number.
    pub fn max_tile(&self) -> Option<TileNumber> {
        self.placements.keys().next_back().copied()
    }

    /// Array extent of one layer.
    pub const fn extent(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// A free rectangle inside the layer being filled.
#[derive(Debug, Clone, Copy)]
struct FreeSpace {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Packs tiles into array layers, downscaling tiles above a resolution limit.
#[derive(Debug, Clone, Copy)]
pub struct TilePacker {
    limit: u32,
}

impl TilePacker {
    /// Create a packer with a per-axis resolution limit.
    pub const fn new(limit: u32) -> Self {
        Self { limit }
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Size a tile is packed at.
    ///
    /// Tiles above the limit on either axis are shrunk to powers of two.
    pub fn packed_size(&self, width: u32, height: u32) -> UVec2 {
        limit_size(UVec2::new(width, height), self.limit)
    }

    /// Pack tiles into layers as large as the largest (downscaled) tile.
    pub fn pack(&self, requests: &[PackRequest]) -> Result<PackedTileLayout, PackError> {
        let extent = requests
            .iter()
            .map(|r| self.packed_size(r.width, r.height))
            .fold(UVec2::ZERO, UVec2::max);
        self.pack_with_extent(requests, extent.x, extent.y)
    }

    /// Pack tiles into layers of a fixed extent.
    pub fn pack_with_extent(
        &self,
        requests: &[PackRequest],
        layer_width: u32,
        layer_height: u32,
    ) -> Result<PackedTileLayout, PackError> {
        if requests.is_empty() {
            return Err(PackError::Empty);
        }

        let mut layout = PackedTileLayout {
            width: layer_width,
            height: layer_height,
            layers: 0,
            placements: BTreeMap::new(),
        };

        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            let size = self.packed_size(request.width, request.height);
            if size.x == 0 || size.y == 0 {
                // Nothing to upload; keep the tile addressable.
                layout.placements.insert(
                    request.tile,
                    TilePlacement {
                        layer: 0,
                        offset: UVec2::ZERO,
                        size: UVec2::ZERO,
                    },
                );
                continue;
            }
            if size.x > layer_width || size.y > layer_height {
                return Err(PackError::TileTooLarge {
                    tile: request.tile,
                    width: size.x,
                    height: size.y,
                    layer_width,
                    layer_height,
                });
            }
            pending.push((request.tile, size));
        }

        // Stable sort keeps input order among equal scores.
        pending.sort_by(|a, b| pack_score(b.1).total_cmp(&pack_score(a.1)));

        while !pending.is_empty() {
            let layer = layout.layers;
            let mut spaces = vec![FreeSpace {
                x: 0,
                y: 0,
                w: layer_width,
                h: layer_height,
            }];
            let before = pending.len();
            pending.retain(|&(tile, size)| match place(&mut spaces, size) {
                Some(offset) => {
                    layout.placements.insert(tile, TilePlacement { layer, offset, size });
                    false
                }
                None => true,
            });
            // Every pending tile fits an empty layer, so a pass always places one.
            debug_assert!(pending.len() < before);
            layout.layers += 1;
        }

        Ok(layout)
    }
}

/// Packing priority: area weighted by aspect ratio.
fn pack_score(size: UVec2) -> f64 {
    let w = f64::from(size.x);
    let h = f64::from(size.y);
    w.max(h) / w.min(h) * w * h
}

/// Place a box into the first free space that fits and split that space.
fn place(spaces: &mut Vec<FreeSpace>, size: UVec2) -> Option<UVec2> {
    let (bw, bh) = (size.x, size.y);
    let index = spaces.iter().position(|s| bw <= s.w && bh <= s.h)?;
    let space = &mut spaces[index];
    let offset = UVec2::new(space.x, space.y);

    if bw == space.w && bh == space.h {
        spaces.remove(index);
    } else if bw == space.w {
        space.y += bh;
        space.h -= bh;
    } else if bh == space.h {
        space.x += bw;
        space.w -= bw;
    } else {
        // Split the L-shaped remainder keeping the larger rectangle in place;
        // the smaller one goes before it so it is tried first.
        let area_hsplit_large = u64::from(space.w) * u64::from(space.h - bh);
        let area_vsplit_large = u64::from(space.w - bw) * u64::from(space.h);
        let small = if area_hsplit_large > area_vsplit_large {
            let small = FreeSpace {
                x: space.x + bw,
                y: space.y,
                w: space.w - bw,
                h: bh,
            };
            space.y += bh;
            space.h -= bh;
            small
        } else {
            let small = FreeSpace {
                x: space.x,
                y: space.y + bh,
                w: bw,
                h: space.h - bh,
            };
            space.x += bw;
            space.w -= bw;
            small
        };
        spaces.insert(index, small);
    }

    Some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn requests(sizes: &[(u32, u32)]) -> Vec<PackRequest> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| PackRequest::new(TileNumber::from_index(i as u32), w, h))
            .collect()
    }

    fn assert_no_overlap(layout: &PackedTileLayout) {
        let placements: Vec<_> = layout.iter().collect();
        for (i, (_, a)) in placements.iter().enumerate() {
            assert!(a.layer < layout.layers || a.is_empty());
            if !a.is_empty() {
                assert!(a.offset.x + a.size.x <= layout.width);
                assert!(a.offset.y + a.size.y <= layout.height);
            }
            for (_, b) in &placements[i + 1..] {
                if a.layer == b.layer {
                    assert!(!a.rect().overlaps(&b.rect()), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn three_tiles_share_one_layer() {
        let tiles = requests(&[(512, 512), (256, 256), (1024, 512)]);
        let layout = TilePacker::new(16384)
            .pack_with_extent(&tiles, 1024, 1024)
            .unwrap();
        assert_eq!(layout.layers, 1);
        assert_eq!(layout.len(), 3);
        assert_no_overlap(&layout);
        // Widest tile goes first.
        assert_eq!(
            layout.placement(TileNumber(1003)).unwrap().offset,
            UVec2::ZERO
        );
    }

    #[test]
    fn full_size_tiles_get_a_layer_each() {
        let tiles = requests(&[(1024, 1024); 5]);
        let layout = TilePacker::new(16384).pack(&tiles).unwrap();
        assert_eq!(layout.layers, 5);
        assert_eq!(layout.extent(), UVec2::new(1024, 1024));
        let mut layers: Vec<_> = layout.iter().map(|(_, p)| p.layer).collect();
        layers.sort_unstable();
        assert_eq!(layers, vec![0, 1, 2, 3, 4]);
        assert!(layout.iter().all(|(_, p)| p.offset == UVec2::ZERO));
    }

    #[test]
    fn every_tile_is_placed_without_overlap() {
        let tiles = requests(&[
            (300, 200),
            (128, 512),
            (64, 64),
            (512, 100),
            (200, 300),
            (77, 33),
            (512, 512),
            (16, 400),
            (90, 90),
            (1, 1),
        ]);
        let layout = TilePacker::new(16384).pack(&tiles).unwrap();
        assert_eq!(layout.len(), tiles.len());
        assert_no_overlap(&layout);
        for request in &tiles {
            let placement = layout.placement(request.tile).unwrap();
            assert_eq!(placement.size, UVec2::new(request.width, request.height));
        }
    }

    #[test]
    fn packing_is_deterministic() {
        let tiles = requests(&[(100, 50), (50, 100), (75, 75), (100, 50), (20, 80)]);
        let packer = TilePacker::new(16384);
        let first = packer.pack(&tiles).unwrap();
        for _ in 0..10 {
            assert_eq!(packer.pack(&tiles).unwrap(), first);
        }
    }

    #[test]
    fn generated_tile_sets_pack_completely_and_repeatably() {
        let mut rng = StdRng::seed_from_u64(0x0DD1_7E55);
        for _ in 0..200 {
            let count = rng.gen_range(1..=40);
            let limit = [64, 256, 1024, 16384][rng.gen_range(0..4)];
            let sizes: Vec<(u32, u32)> = (0..count)
                .map(|_| (rng.gen_range(1..=2048), rng.gen_range(1..=2048)))
                .collect();
            let tiles = requests(&sizes);
            let packer = TilePacker::new(limit);

            let layout = packer.pack(&tiles).unwrap();
            assert_eq!(layout.len(), tiles.len());
            assert_no_overlap(&layout);
            for request in &tiles {
                let placement = layout.placement(request.tile).unwrap();
                assert_eq!(placement.size, packer.packed_size(request.width, request.height));
            }
            assert_eq!(packer.pack(&tiles).unwrap(), layout);
        }
    }

    #[test]
    fn oversized_tiles_are_downscaled_to_powers_of_two() {
        let tiles = requests(&[(3000, 1000), (800, 600)]);
        let layout = TilePacker::new(1024).pack(&tiles).unwrap();
        let big = layout.placement(TileNumber(1001)).unwrap();
        assert_eq!(big.size, UVec2::new(1024, 512));
        let small = layout.placement(TileNumber(1002)).unwrap();
        assert_eq!(small.size, UVec2::new(800, 600));
        for (tile, placement) in layout.iter() {
            let request = tiles.iter().find(|r| r.tile == tile).unwrap();
            assert!(placement.size.x <= request.width && placement.size.y <= request.height);
        }
    }

    #[test]
    fn tile_larger_than_extent_fails() {
        let tiles = requests(&[(512, 512), (2048, 16)]);
        let err = TilePacker::new(16384)
            .pack_with_extent(&tiles, 1024, 1024)
            .unwrap_err();
        assert!(matches!(err, PackError::TileTooLarge { width: 2048, .. }));
    }

    #[test]
    fn empty_input_fails() {
        assert_eq!(TilePacker::new(1024).pack(&[]), Err(PackError::Empty));
    }

    #[test]
    fn guillotine_split_keeps_larger_region() {
        // A 2x1 box in a 4x4 space: the horizontal split leaves the larger remainder.
        let mut spaces = vec![FreeSpace { x: 0, y: 0, w: 4, h: 4 }];
        assert_eq!(place(&mut spaces, UVec2::new(2, 1)), Some(UVec2::ZERO));
        assert_eq!(spaces.len(), 2);
        assert_eq!((spaces[0].x, spaces[0].y, spaces[0].w, spaces[0].h), (2, 0, 2, 1));
        assert_eq!((spaces[1].x, spaces[1].y, spaces[1].w, spaces[1].h), (0, 1, 4, 3));
    }
}
