//! Discovery and decoding of UDIM tile files.

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use udim_core::TileNumber;
use udim_image::{ColorSpace, ImageBuffer, MemoryTileSource};

/// Token replaced by the tile number in path patterns.
pub const UDIM_TOKEN: &str = "<UDIM>";

/// A path pattern such as `textures/skin.<UDIM>.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePattern {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl TilePattern {
    pub fn parse(pattern: &str) -> anyhow::Result<Self> {
        let path = Path::new(pattern);
        let file = path
            .file_name()
            .and_then(|f| f.to_str())
            .with_context(|| format!("pattern has no file name: {pattern}"))?;
        let Some((prefix, suffix)) = file.split_once(UDIM_TOKEN) else {
            bail!("pattern must contain {UDIM_TOKEN} in the file name: {pattern}");
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Path of one tile.
    pub fn path(&self, tile: TileNumber) -> PathBuf {
        self.dir.join(format!("{}{}{}", self.prefix, tile, self.suffix))
    }

    /// Tile number encoded in a file name, if it matches the pattern.
    pub fn match_file_name(&self, name: &str) -> Option<TileNumber> {
        let digits = name.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        TileNumber::new(digits.parse().ok()?).ok()
    }

    /// Tiles present on disk, sorted.
    pub fn discover(&self) -> anyhow::Result<Vec<TileNumber>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;
        let mut tiles = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(tile) = entry.file_name().to_str().and_then(|n| self.match_file_name(n)) {
                tiles.push(tile);
            }
        }
        tiles.sort_unstable();
        Ok(tiles)
    }
}

/// Decode one tile file to an 8-bit RGBA buffer.
pub fn load_tile(path: &Path, colorspace: ColorSpace) -> anyhow::Result<ImageBuffer> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(ImageBuffer::from_bytes(
        width,
        height,
        decoded.into_raw(),
        colorspace,
    )?)
}

/// Tile source decoding files lazily on first access.
pub fn file_source(pattern: TilePattern, colorspace: ColorSpace) -> MemoryTileSource {
    MemoryTileSource::with_loader(move |tile, _view| {
        let path = pattern.path(tile);
        match load_tile(&path, colorspace) {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                tracing::warn!(tile = tile.0, "{err:#}");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_round_trip() {
        let pattern = TilePattern::parse("textures/skin.<UDIM>.png").unwrap();
        assert_eq!(
            pattern.path(TileNumber(1012)),
            PathBuf::from("textures/skin.1012.png")
        );
        assert_eq!(pattern.match_file_name("skin.1012.png"), Some(TileNumber(1012)));
        assert_eq!(pattern.match_file_name("skin.12.png"), None);
        assert_eq!(pattern.match_file_name("skin.0999.png"), None);
        assert_eq!(pattern.match_file_name("hair.1001.png"), None);
    }

    #[test]
    fn bare_file_pattern_uses_current_dir() {
        let pattern = TilePattern::parse("<UDIM>.exr").unwrap();
        assert_eq!(pattern.path(TileNumber(1001)), PathBuf::from("./1001.exr"));
    }

    #[test]
    fn pattern_without_token_fails() {
        assert!(TilePattern::parse("skin.1001.png").is_err());
    }

    #[test]
    fn discover_and_load_written_tiles() {
        let dir = std::env::temp_dir().join(format!("udim-inspect-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for tile in [1001, 1003] {
            let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]));
            img.save(dir.join(format!("t.{tile}.png"))).unwrap();
        }
        std::fs::write(dir.join("t.notes.png"), b"").unwrap();

        let pattern = TilePattern::parse(dir.join("t.<UDIM>.png").to_str().unwrap()).unwrap();
        assert_eq!(pattern.discover().unwrap(), vec![TileNumber(1001), TileNumber(1003)]);

        let buffer = load_tile(&pattern.path(TileNumber(1003)), ColorSpace::Srgb).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (4, 2));
        assert_eq!(buffer.pixel(0, 0), [1.0, 0.0, 0.0, 1.0]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
