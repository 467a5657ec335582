//! Pixel buffer providers.

use crate::buffer::ImageBuffer;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use udim_core::{ImageUser, TileNumber};

/// Supplies the pixel buffers of one image.
pub trait TileSource: Send + Sync {
    /// Buffer for the tile and view selected by `user`.
    ///
    /// `None` when no buffer is available (missing file, unloaded render
    /// result). `user.tile == None` selects the first tile.
    fn acquire(&self, user: &ImageUser) -> Option<Arc<ImageBuffer>>;

    /// Drop decoded pixel data so it can be reloaded later.
    fn free_buffers(&self) {}
}

/// Loads a buffer for `(tile, view)` on demand.
pub type TileLoader = dyn Fn(TileNumber, u16) -> Option<ImageBuffer> + Send + Sync;

/// Tile buffers held in memory, optionally backed by a loader.
///
/// Without a loader, [`TileSource::free_buffers`] is a no-op since the
/// buffers could not be recovered.
pub struct MemoryTileSource {
    buffers: RwLock<BTreeMap<(TileNumber, u16), Arc<ImageBuffer>>>,
    loader: Option<Box<TileLoader>>,
    loads: AtomicUsize,
    frees: AtomicUsize,
}

impl MemoryTileSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            buffers: RwLock::new(BTreeMap::new()),
            loader: None,
            loads: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Create a source that decodes buffers on first use.
    pub fn with_loader(
        loader: impl Fn(TileNumber, u16) -> Option<ImageBuffer> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            ..Self::new()
        }
    }

    /// Store the view 0 buffer of a tile.
    pub fn insert(&self, tile: TileNumber, buffer: ImageBuffer) {
        self.insert_view(tile, 0, buffer);
    }

    /// Store the buffer of one view of a tile.
    pub fn insert_view(&self, tile: TileNumber, view: u16, buffer: ImageBuffer) {
        self.buffers.write().insert((tile, view), Arc::new(buffer));
    }

    /// Remove every view of a tile.
    pub fn remove(&self, tile: TileNumber) {
        self.buffers.write().retain(|(t, _), _| *t != tile);
    }

    /// Modify the view 0 buffer of a tile in place.
    ///
    /// Buffers still borrowed by a caller are copied first. Returns false if
    /// the tile is not resident.
    pub fn edit(&self, tile: TileNumber, f: impl FnOnce(&mut ImageBuffer)) -> bool {
        let mut buffers = self.buffers.write();
        let Some(buffer) = buffers.get_mut(&(tile, 0)) else {
            return false;
        };
        f(Arc::make_mut(buffer));
        true
    }

    /// Tiles with at least one resident buffer, ascending.
    pub fn tiles(&self) -> Vec<TileNumber> {
        let mut tiles: Vec<_> = self.buffers.read().keys().map(|(tile, _)| *tile).collect();
        tiles.dedup();
        tiles
    }

    /// Check if any buffer is resident.
    pub fn is_loaded(&self) -> bool {
        !self.buffers.read().is_empty()
    }

    /// Number of buffers produced by the loader.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of times resident buffers were dropped.
    pub fn free_count(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    fn resident(&self, tile: Option<TileNumber>, view: u16) -> Option<Arc<ImageBuffer>> {
        let buffers = self.buffers.read();
        let tile = match tile {
            Some(tile) => tile,
            None => buffers.keys().next()?.0,
        };
        buffers
            .get(&(tile, view))
            .or_else(|| buffers.get(&(tile, 0)))
            .cloned()
    }
}

impl Default for MemoryTileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for MemoryTileSource {
    fn acquire(&self, user: &ImageUser) -> Option<Arc<ImageBuffer>> {
        if let Some(buffer) = self.resident(user.tile, user.view) {
            return Some(buffer);
        }

        let loader = self.loader.as_ref()?;
        let tile = user.tile.unwrap_or(TileNumber::FIRST);
        let buffer = Arc::new(loader(tile, user.view)?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            tile = tile.0,
            view = user.view,
            width = buffer.width(),
            height = buffer.height(),
            "tile buffer loaded"
        );
        self.buffers
            .write()
            .insert((tile, user.view), Arc::clone(&buffer));
        Some(buffer)
    }

    fn free_buffers(&self) {
        if self.loader.is_none() {
            return;
        }
        let mut buffers = self.buffers.write();
        if !buffers.is_empty() {
            tracing::debug!(count = buffers.len(), "tile buffers freed");
            buffers.clear();
            self.frees.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::ColorSpace;

    fn solid(width: u32) -> ImageBuffer {
        ImageBuffer::solid_bytes(width, 4, [255; 4], ColorSpace::Srgb).unwrap()
    }

    #[test]
    fn missing_view_falls_back_to_view_zero() {
        let source = MemoryTileSource::new();
        source.insert(TileNumber(1002), solid(8));
        let user = ImageUser::for_tile(TileNumber(1002)).with_view(1);
        assert_eq!(source.acquire(&user).unwrap().width(), 8);
        assert!(source.acquire(&ImageUser::for_tile(TileNumber(1003))).is_none());
    }

    #[test]
    fn no_tile_selects_first() {
        let source = MemoryTileSource::new();
        source.insert(TileNumber(1005), solid(16));
        source.insert(TileNumber(1002), solid(8));
        assert_eq!(source.acquire(&ImageUser::default()).unwrap().width(), 8);
        assert_eq!(source.tiles(), vec![TileNumber(1002), TileNumber(1005)]);
    }

    #[test]
    fn loader_reloads_after_free() {
        let source = MemoryTileSource::with_loader(|tile, _| {
            (tile.0 < 1003).then(|| ImageBuffer::solid_floats(4, 4, [1.0; 4]).unwrap())
        });
        let user = ImageUser::for_tile(TileNumber(1002));
        assert!(source.acquire(&user).is_some());
        assert!(source.acquire(&user).is_some());
        assert_eq!(source.load_count(), 1);

        source.free_buffers();
        assert!(!source.is_loaded());
        assert_eq!(source.free_count(), 1);
        assert!(source.acquire(&user).is_some());
        assert_eq!(source.load_count(), 2);

        assert!(source.acquire(&ImageUser::for_tile(TileNumber(1004))).is_none());
    }

    #[test]
    fn free_without_loader_keeps_buffers() {
        let source = MemoryTileSource::new();
        source.insert(TileNumber::FIRST, solid(4));
        source.free_buffers();
        assert!(source.is_loaded());
    }

    #[test]
    fn edit_copies_shared_buffers() {
        let source = MemoryTileSource::new();
        source.insert(TileNumber::FIRST, solid(4));
        let before = source.acquire(&ImageUser::default()).unwrap();
        assert!(source.edit(TileNumber::FIRST, |buf| {
            buf.fill_rect(udim_core::PixelRect::new(0, 0, 1, 1), [0.0, 0.0, 0.0, 1.0]);
        }));
        let after = source.acquire(&ImageUser::default()).unwrap();
        assert_eq!(before.pixel(0, 0), [1.0; 4]);
        assert_eq!(after.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
    }
}
