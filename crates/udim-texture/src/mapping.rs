//! Tile mapping lookup texture.
//!
//! Shaders resolve a UDIM tile to its place in the array texture through a
//! 1D array texture indexed by `tile - 1001`:
//! - row 0: `[layer, 0, 0, 0]`, layer `-1` where no tile exists
//! - row 1: `[offset.x / W, offset.y / H, size.x / W, size.y / H]`

use crate::packer::{PackedTileLayout, TilePlacement};
use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2, Vec4};
use udim_core::TileNumber;
use udim_gpu::{GpuBackend, TexelData, TexelUpload, TextureDesc, TextureFormat, TextureId};

/// Layer value of indices without a tile.
pub const NO_TILE: f32 = -1.0;

/// One RGBA32F texel of the mapping texture.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MappingTexel(pub [f32; 4]);

/// Decoded mapping entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingEntry {
    pub layer: u32,
    /// Normalized offset within the layer.
    pub offset: Vec2,
    /// Normalized size within the layer.
    pub size: Vec2,
}

/// Host copy of the mapping texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMapping {
    width: u32,
    extent: UVec2,
    /// Row 0 followed by row 1.
    texels: Vec<MappingTexel>,
}

impl TileMapping {
    /// Build the mapping for a layout. `None` if the layout is empty.
    pub fn from_layout(layout: &PackedTileLayout) -> Option<Self> {
        let width = layout.max_tile()?.index() + 1;
        let extent = layout.extent().max(UVec2::ONE);
        let scale = extent.as_vec2();

        let mut texels = vec![MappingTexel([0.0; 4]); 2 * width as usize];
        for texel in &mut texels[..width as usize] {
            texel.0[0] = NO_TILE;
        }
        for (tile, placement) in layout.iter() {
            let i = tile.index() as usize;
            texels[i].0[0] = placement.layer as f32;
            let offset = placement.offset.as_vec2() / scale;
            let size = placement.size.as_vec2() / scale;
            texels[width as usize + i] = MappingTexel(Vec4::new(offset.x, offset.y, size.x, size.y).into());
        }

        Some(Self {
            width,
            extent,
            texels,
        })
    }

    /// Number of entries (highest tile index + 1).
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Raw texels, two rows of [`Self::width`].
    pub fn texels(&self) -> &[MappingTexel] {
        &self.texels
    }

    /// Texels as a flat float slice.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Decode the entry of a tile. `None` if the tile is absent.
    pub fn entry(&self, tile: TileNumber) -> Option<MappingEntry> {
        let i = tile.index();
        if i >= self.width {
            return None;
        }
        let layer = self.texels[i as usize].0[0];
        if layer < 0.0 {
            return None;
        }
        let [ox, oy, sx, sy] = self.texels[(self.width + i) as usize].0;
        Some(MappingEntry {
            layer: layer as u32,
            offset: Vec2::new(ox, oy),
            size: Vec2::new(sx, sy),
        })
    }

    /// Decode the entry of a tile back into texel units.
    pub fn lookup(&self, tile: TileNumber) -> Option<TilePlacement> {
        let entry = self.entry(tile)?;
        let scale = self.extent.as_vec2();
        Some(TilePlacement {
            layer: entry.layer,
            offset: (entry.offset * scale).round().as_uvec2(),
            size: (entry.size * scale).round().as_uvec2(),
        })
    }

    /// Create the GPU texture: 1D array, 2 rows, RGBA32F, nearest, no mips.
    pub fn upload<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        label: &str,
    ) -> udim_gpu::Result<TextureId> {
        let desc = TextureDesc::d1_array(
            format!("{label}.tile_mapping"),
            TextureFormat::Rgba32F,
            self.width,
            2,
        );
        let data = TexelUpload::packed(TexelData::Floats(self.as_floats()), self.width);
        let texture = backend.create_texture(&desc, Some(data))?;
        backend.set_mipmap_mode(texture, false, false)?;
        tracing::debug!(texture = texture.0, width = self.width, "tile mapping created");
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::{PackRequest, TilePacker};
    use approx::assert_relative_eq;
    use udim_gpu::SoftwareBackend;

    fn layout() -> PackedTileLayout {
        let requests = [
            PackRequest::new(TileNumber(1001), 512, 512),
            PackRequest::new(TileNumber(1002), 256, 256),
            PackRequest::new(TileNumber(1005), 1024, 512),
        ];
        TilePacker::new(16384)
            .pack_with_extent(&requests, 1024, 1024)
            .unwrap()
    }

    #[test]
    fn lookup_matches_layout() {
        let layout = layout();
        let mapping = TileMapping::from_layout(&layout).unwrap();
        assert_eq!(mapping.width(), 5);
        for (tile, placement) in layout.iter() {
            assert_eq!(mapping.lookup(tile).as_ref(), Some(placement));
        }
    }

    #[test]
    fn missing_tiles_have_negative_layer() {
        let mapping = TileMapping::from_layout(&layout()).unwrap();
        for tile in [TileNumber(1003), TileNumber(1004), TileNumber(1006)] {
            assert!(mapping.lookup(tile).is_none());
        }
        let floats = mapping.as_floats();
        assert_relative_eq!(floats[4 * 2], NO_TILE);
        // Geometry of missing tiles is zeroed.
        assert!(floats[4 * (5 + 2)..4 * (5 + 3)].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn entries_are_normalized() {
        let layout = layout();
        let mapping = TileMapping::from_layout(&layout).unwrap();
        let entry = mapping.entry(TileNumber(1005)).unwrap();
        assert_eq!(entry.layer, 0);
        assert_relative_eq!(entry.size.x, 1.0);
        assert_relative_eq!(entry.size.y, 0.5);

        let small = layout.placement(TileNumber(1002)).unwrap();
        let entry = mapping.entry(TileNumber(1002)).unwrap();
        assert_relative_eq!(entry.offset.x, small.offset.x as f32 / 1024.0);
        assert_relative_eq!(entry.offset.y, small.offset.y as f32 / 1024.0);
        assert_relative_eq!(entry.size.x, 0.25);
    }

    #[test]
    fn upload_creates_two_row_texture() {
        let mut backend = SoftwareBackend::default();
        let mapping = TileMapping::from_layout(&layout()).unwrap();
        let texture = mapping.upload(&mut backend, "udim").unwrap();
        let desc = backend.desc(texture).unwrap();
        assert_eq!((desc.width, desc.layers), (5, 2));
        assert_eq!(desc.format, TextureFormat::Rgba32F);
        assert_eq!(backend.mipmap_mode(texture), Some((false, false)));
        assert_eq!(backend.read_back(texture).unwrap(), mapping.as_floats());
    }
}
