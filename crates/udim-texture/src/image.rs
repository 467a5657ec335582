//! Images as seen by the texture cache.

use bitflags::bitflags;
use std::sync::Arc;
use udim_core::{ImageId, ImageUser, TileNumber};
use udim_image::{ImageBuffer, TileSource};

/// Origin of an image's pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Loaded from a file or painted.
    #[default]
    Image,
    /// Procedurally generated (UV grid, blank canvas).
    Generated,
    /// Output of a render.
    RenderResult,
    /// Output of the compositor.
    Composite,
}

/// How the alpha channel of the source data is to be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Straight,
    Premultiplied,
    /// Alpha holds unrelated data.
    ChannelPacked,
    /// Alpha is ignored.
    Ignore,
}

bitflags! {
    /// Per-image cache behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u8 {
        /// Use 32-bit float textures for float buffers.
        const HIGH_BIT_DEPTH = 0b0000_0001;
        /// Never garbage collect.
        const NO_COLLECT     = 0b0000_0010;
    }
}

/// An image with one or more UDIM tiles.
///
/// Cheap to clone; the pixel data lives in the shared [`TileSource`].
#[derive(Clone)]
pub struct Image {
    id: ImageId,
    name: String,
    kind: ImageKind,
    alpha_mode: AlphaMode,
    flags: ImageFlags,
    tiled: bool,
    /// Sorted, unique.
    tiles: Vec<TileNumber>,
    source: Arc<dyn TileSource>,
}

impl Image {
    /// Create a single-tile image.
    pub fn new(name: impl Into<String>, source: Arc<dyn TileSource>) -> Self {
        Self {
            id: ImageId::next(),
            name: name.into(),
            kind: ImageKind::default(),
            alpha_mode: AlphaMode::default(),
            flags: ImageFlags::empty(),
            tiled: false,
            tiles: vec![TileNumber::FIRST],
            source,
        }
    }

    /// Create a UDIM image with the given tiles.
    pub fn tiled(
        name: impl Into<String>,
        tiles: impl IntoIterator<Item = TileNumber>,
        source: Arc<dyn TileSource>,
    ) -> Self {
        let mut tiles: Vec<_> = tiles.into_iter().collect();
        tiles.sort_unstable();
        tiles.dedup();
        Self {
            tiled: true,
            tiles,
            ..Self::new(name, source)
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ImageKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ImageFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub const fn id(&self) -> ImageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub const fn kind(&self) -> ImageKind {
        self.kind
    }

    #[inline]
    pub const fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    #[inline]
    pub const fn flags(&self) -> ImageFlags {
        self.flags
    }

    /// True for UDIM images.
    #[inline]
    pub const fn is_tiled(&self) -> bool {
        self.tiled
    }

    /// Tile numbers, ascending.
    pub fn tiles(&self) -> &[TileNumber] {
        &self.tiles
    }

    pub fn first_tile(&self) -> Option<TileNumber> {
        self.tiles.first().copied()
    }

    /// Add a tile. The caller is expected to request a full update afterwards.
    pub fn add_tile(&mut self, tile: TileNumber) {
        if let Err(at) = self.tiles.binary_search(&tile) {
            self.tiles.insert(at, tile);
        }
    }

    /// Remove a tile. Returns false if it did not exist.
    pub fn remove_tile(&mut self, tile: TileNumber) -> bool {
        match self.tiles.binary_search(&tile) {
            Ok(at) => {
                self.tiles.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    /// Buffer of `tile` for the pass, layer and view selected by `user`.
    pub fn acquire_tile(&self, user: &ImageUser, tile: TileNumber) -> Option<Arc<ImageBuffer>> {
        self.source.acquire(&user.with_tile(tile))
    }

    /// Whether GPU textures of this image store premultiplied alpha.
    pub fn store_premultiplied(&self, buffer: &ImageBuffer) -> bool {
        match self.kind {
            ImageKind::RenderResult | ImageKind::Composite => true,
            // Generated float buffers are premultiplied, byte buffers straight.
            ImageKind::Generated => buffer.is_float(),
            ImageKind::Image if buffer.is_float() => self.alpha_mode != AlphaMode::Straight,
            ImageKind::Image => self.alpha_mode == AlphaMode::Premultiplied,
        }
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("alpha_mode", &self.alpha_mode)
            .field("flags", &self.flags)
            .field("tiles", &self.tiles)
            .finish_non_exhaustive()
    }
}
