//! Tracking of pixel changes not yet uploaded to the GPU.

use udim_core::{PixelRect, TileNumber};

/// A changed rectangle of one tile, in buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyRegion {
    pub tile: TileNumber,
    pub rect: PixelRect,
}

impl DirtyRegion {
    pub const fn new(tile: TileNumber, rect: PixelRect) -> Self {
        Self { tile, rect }
    }
}

/// Synchronization state of an image's GPU textures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing tracked yet.
    #[default]
    Unknown,
    /// GPU copies match the buffers.
    Clean,
    /// Some regions changed.
    Dirty(Vec<DirtyRegion>),
    /// Textures must be rebuilt.
    FullInvalid,
}

/// Work needed to bring the GPU copies up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    None,
    /// Free the textures; they are rebuilt on demand.
    Full,
    /// Re-upload these regions.
    Partial(Vec<DirtyRegion>),
}

/// Per-image change tracker.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdateSync {
    state: SyncState,
}

impl PartialUpdateSync {
    pub const fn new() -> Self {
        Self {
            state: SyncState::Unknown,
        }
    }

    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    /// Check if an upload or rebuild is pending.
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, SyncState::Dirty(_) | SyncState::FullInvalid)
    }

    /// Record a changed region. Ignored while a full update is pending.
    ///
    /// Pending regions of the same tile that overlap it are merged into their
    /// bounding rectangle.
    pub fn mark_region(&mut self, region: DirtyRegion) {
        if region.rect.is_empty() {
            return;
        }
        match self.state {
            SyncState::FullInvalid => {}
            SyncState::Dirty(ref mut regions) => {
                let mut merged = region;
                loop {
                    let before = regions.len();
                    regions.retain(|pending| {
                        let absorb = pending.tile == merged.tile && pending.rect.overlaps(&merged.rect);
                        if absorb {
                            merged.rect = merged.rect.union(&pending.rect);
                        }
                        !absorb
                    });
                    if regions.len() == before {
                        break;
                    }
                }
                regions.push(merged);
            }
            SyncState::Unknown | SyncState::Clean => {
                self.state = SyncState::Dirty(vec![region]);
            }
        }
    }

    /// Request a full rebuild, dropping pending regions.
    pub fn mark_full(&mut self) {
        self.state = SyncState::FullInvalid;
    }

    /// Take the pending work and return to [`SyncState::Clean`].
    pub fn take(&mut self) -> SyncAction {
        match std::mem::replace(&mut self.state, SyncState::Clean) {
            SyncState::Unknown | SyncState::Clean => SyncAction::None,
            SyncState::Dirty(regions) => SyncAction::Partial(regions),
            SyncState::FullInvalid => SyncAction::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: i32) -> DirtyRegion {
        DirtyRegion::new(TileNumber(1002), PixelRect::new(x, 0, x + 4, 4))
    }

    #[test]
    fn regions_accumulate() {
        let mut sync = PartialUpdateSync::new();
        assert_eq!(sync.take(), SyncAction::None);
        assert_eq!(sync.state(), &SyncState::Clean);

        sync.mark_region(region(0));
        sync.mark_region(region(8));
        sync.mark_region(region(0));
        assert!(sync.is_pending());
        assert_eq!(sync.take(), SyncAction::Partial(vec![region(8), region(0)]));
        assert_eq!(sync.take(), SyncAction::None);
    }

    #[test]
    fn overlapping_regions_merge() {
        let mut sync = PartialUpdateSync::new();
        sync.mark_region(region(0));
        sync.mark_region(region(8));
        // Touching only, kept apart.
        sync.mark_region(region(4));
        let other_tile = DirtyRegion::new(TileNumber(1003), PixelRect::new(2, 0, 6, 4));
        sync.mark_region(other_tile);
        assert_eq!(
            sync.state(),
            &SyncState::Dirty(vec![region(0), region(8), region(4), other_tile])
        );

        // Bridges all three regions of tile 1002.
        sync.mark_region(DirtyRegion::new(TileNumber(1002), PixelRect::new(2, 1, 10, 3)));
        assert_eq!(
            sync.take(),
            SyncAction::Partial(vec![
                other_tile,
                DirtyRegion::new(TileNumber(1002), PixelRect::new(0, 0, 12, 4)),
            ])
        );
    }

    #[test]
    fn long_strokes_stay_bounded() {
        let mut sync = PartialUpdateSync::new();
        for x in 0..1000 {
            sync.mark_region(DirtyRegion::new(TileNumber(1002), PixelRect::new(x, x, x + 3, x + 3)));
        }
        assert_eq!(
            sync.take(),
            SyncAction::Partial(vec![DirtyRegion::new(
                TileNumber(1002),
                PixelRect::new(0, 0, 1002, 1002)
            )])
        );
    }

    #[test]
    fn full_update_supersedes_regions() {
        let mut sync = PartialUpdateSync::new();
        sync.mark_region(region(0));
        sync.mark_full();
        sync.mark_region(region(4));
        assert_eq!(sync.state(), &SyncState::FullInvalid);
        assert_eq!(sync.take(), SyncAction::Full);
        assert_eq!(sync.state(), &SyncState::Clean);
    }

    #[test]
    fn empty_regions_are_ignored() {
        let mut sync = PartialUpdateSync::new();
        sync.mark_region(DirtyRegion::new(TileNumber::FIRST, PixelRect::new(5, 5, 5, 9)));
        assert!(!sync.is_pending());
    }
}
