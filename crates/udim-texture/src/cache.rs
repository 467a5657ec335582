//! GPU texture cache.
//!
//! Owns every GPU texture created for images. Textures are created lazily on
//! [`TextureCache::acquire`], kept in sync with edited pixels through partial
//! re-uploads, and released explicitly, through the deferred free queue, or
//! by the garbage collector.

use crate::builder::{ArrayBuild, SingleBuild, TileArrayBuilder};
use crate::config::TextureCacheConfig;
use crate::error::Result;
use crate::gc::{Clock, GcClock, GcContext, GcReport, GcSkip, SystemClock};
use crate::image::{Image, ImageFlags};
use crate::mapping::TileMapping;
use crate::packer::{PackedTileLayout, TilePlacement};
use crate::partial_update::{DirtyRegion, PartialUpdateSync, SyncAction, SyncState};
use crate::upload::update_from_buffer;
use glam::UVec2;
use hashbrown::HashMap;
use std::sync::Arc;
use udim_core::{ImageId, ImageUser, PixelRect};
use udim_gpu::{DeferredFreeQueue, GpuBackend, TextureDimension, TextureId};
use udim_image::{ColorManagement, StandardColorManagement, TileSource};

/// Kind of texture cached for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Single 2D texture of the first tile.
    Plain2D,
    /// 2D array holding every tile.
    Array2D,
    /// Lookup texture paired with [`TextureTarget::Array2D`].
    TileMapping,
}

impl TextureTarget {
    /// Dimensionality of the placeholder for this target.
    pub const fn error_dimension(self) -> TextureDimension {
        match self {
            Self::Plain2D => TextureDimension::D2,
            Self::Array2D => TextureDimension::D2Array,
            Self::TileMapping => TextureDimension::D1Array,
        }
    }
}

/// A texture handed out by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredTexture {
    /// Holds image content.
    Content(TextureId),
    /// Bindable stand-in for missing content.
    Placeholder(TextureId),
}

impl AcquiredTexture {
    pub const fn id(self) -> TextureId {
        match self {
            Self::Content(id) | Self::Placeholder(id) => id,
        }
    }

    pub const fn is_placeholder(self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Result of [`TextureCache::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTextures {
    pub texture: AcquiredTexture,
    /// Mapping texture, for [`TextureTarget::Array2D`] only.
    pub tile_mapping: Option<AcquiredTexture>,
}

/// How textures are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeMode {
    /// Free now. Only valid on the GPU owner thread.
    Immediate,
    /// Queue for the next flush on the owner thread.
    Deferred,
}

/// A cached texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedTexture {
    pub id: TextureId,
    pub placeholder: bool,
    /// View the texture content was read from.
    pub source_view: u16,
}

impl CachedTexture {
    const fn content(id: TextureId, source_view: u16) -> Self {
        Self {
            id,
            placeholder: false,
            source_view,
        }
    }

    const fn placeholder(id: TextureId, source_view: u16) -> Self {
        Self {
            id,
            placeholder: true,
            source_view,
        }
    }

    pub const fn acquired(self) -> AcquiredTexture {
        if self.placeholder {
            AcquiredTexture::Placeholder(self.id)
        } else {
            AcquiredTexture::Content(self.id)
        }
    }
}

/// Textures of one image, keyed by target and view slot.
#[derive(Debug, Default)]
pub struct CacheSlot {
    textures: HashMap<(TextureTarget, u16), CachedTexture>,
    /// Layout of the array texture of each view slot.
    layouts: HashMap<u16, PackedTileLayout>,
}

impl CacheSlot {
    pub fn get(&self, target: TextureTarget, view: u16) -> Option<CachedTexture> {
        self.textures.get(&(target, view)).copied()
    }

    pub fn layout(&self, view: u16) -> Option<&PackedTileLayout> {
        self.layouts.get(&view)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureTarget, u16, CachedTexture)> + '_ {
        self.textures
            .iter()
            .map(|(&(target, view), &texture)| (target, view, texture))
    }

    fn insert(&mut self, target: TextureTarget, view: u16, texture: CachedTexture) -> Option<TextureId> {
        self.textures
            .insert((target, view), texture)
            .map(|old| old.id)
    }

    fn remove(&mut self, target: TextureTarget, view: u16) -> Option<TextureId> {
        self.textures.remove(&(target, view)).map(|t| t.id)
    }

    fn take_all(&mut self) -> Vec<TextureId> {
        self.layouts.clear();
        self.textures.drain().map(|(_, t)| t.id).collect()
    }

    /// Cached result for a target, if complete.
    fn lookup(&self, target: TextureTarget, view: u16) -> Option<GpuTextures> {
        match target {
            TextureTarget::Plain2D => self.get(target, view).map(|t| GpuTextures {
                texture: t.acquired(),
                tile_mapping: None,
            }),
            TextureTarget::Array2D | TextureTarget::TileMapping => {
                let array = self.get(TextureTarget::Array2D, view)?;
                let mapping = self.get(TextureTarget::TileMapping, view)?;
                Some(pair_result(target, array, mapping))
            }
        }
    }
}

fn pair_result(target: TextureTarget, array: CachedTexture, mapping: CachedTexture) -> GpuTextures {
    match target {
        TextureTarget::TileMapping => GpuTextures {
            texture: mapping.acquired(),
            tile_mapping: None,
        },
        TextureTarget::Plain2D | TextureTarget::Array2D => GpuTextures {
            texture: array.acquired(),
            tile_mapping: Some(mapping.acquired()),
        },
    }
}

/// Cache state of one image.
struct ImageRecord {
    name: String,
    source: Arc<dyn TileSource>,
    slot: CacheSlot,
    sync: PartialUpdateSync,
    /// Pass, layer and view of the last acquire.
    key: Option<(u16, u16, u16)>,
    last_used: u64,
    mip_complete: bool,
    no_collect: bool,
}

impl ImageRecord {
    fn new(image: &Image, now: u64) -> Self {
        Self {
            name: image.name().to_string(),
            source: Arc::clone(image.source()),
            slot: CacheSlot::default(),
            sync: PartialUpdateSync::new(),
            key: None,
            last_used: now,
            mip_complete: false,
            no_collect: image.flags().contains(ImageFlags::NO_COLLECT),
        }
    }

    /// Release every texture. Returns how many were released.
    fn free_textures<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        deferred: &DeferredFreeQueue,
        mode: FreeMode,
    ) -> usize {
        let textures = self.slot.take_all();
        let count = textures.len();
        release(backend, deferred, textures, mode);
        self.mip_complete = false;
        count
    }
}

fn release<B: GpuBackend + ?Sized>(
    backend: &mut B,
    deferred: &DeferredFreeQueue,
    textures: Vec<TextureId>,
    mode: FreeMode,
) {
    match mode {
        FreeMode::Immediate => {
            for texture in textures {
                if let Err(err) = backend.free_texture(texture) {
                    tracing::warn!(texture = texture.0, %err, "texture free failed");
                }
            }
        }
        FreeMode::Deferred => deferred.queue_all(textures),
    }
}

/// Per-image GPU texture cache.
///
/// Must be used from the thread owning the GPU context, which is the thread
/// that created it. Other threads release textures through
/// [`TextureCache::free_auto`] or the shared [`DeferredFreeQueue`].
pub struct TextureCache<B: GpuBackend> {
    backend: B,
    config: TextureCacheConfig,
    color: Arc<dyn ColorManagement>,
    clock: Box<dyn Clock>,
    deferred: Arc<DeferredFreeQueue>,
    images: HashMap<ImageId, ImageRecord>,
}

impl<B: GpuBackend> TextureCache<B> {
    /// Create a cache owned by the calling thread.
    pub fn new(backend: B, config: TextureCacheConfig) -> Self {
        tracing::debug!(
            device = %backend.capabilities().summary(),
            resolution_limit = config.resolution_limit,
            mipmap = config.mipmap,
            gc_timeout = config.gc.timeout_secs,
            "texture cache created"
        );
        Self {
            backend,
            config,
            color: Arc::new(StandardColorManagement),
            clock: Box::new(SystemClock::new()),
            deferred: Arc::new(DeferredFreeQueue::new()),
            images: HashMap::new(),
        }
    }

    /// Use a different color management implementation.
    #[must_use]
    pub fn with_color_management(mut self, color: Arc<dyn ColorManagement>) -> Self {
        self.color = color;
        self
    }

    /// Use a different time source for usage tracking.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub const fn config(&self) -> &TextureCacheConfig {
        &self.config
    }

    /// Queue shared with threads that cannot touch the GPU.
    pub fn deferred_queue(&self) -> Arc<DeferredFreeQueue> {
        Arc::clone(&self.deferred)
    }

    /// Number of images with cache state.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of live cached textures over all images.
    pub fn texture_count(&self) -> usize {
        self.images.values().map(|r| r.slot.len()).sum()
    }

    /// Cached textures of an image.
    pub fn slot(&self, image: ImageId) -> Option<&CacheSlot> {
        self.images.get(&image).map(|r| &r.slot)
    }

    /// Pending synchronization work of an image.
    pub fn sync_state(&self, image: ImageId) -> Option<&SyncState> {
        self.images.get(&image).map(|r| r.sync.state())
    }

    /// Time the image was last acquired.
    pub fn last_used(&self, image: ImageId) -> Option<u64> {
        self.images.get(&image).map(|r| r.last_used)
    }

    /// Check if the image's textures carry complete mip chains.
    pub fn is_mip_complete(&self, image: ImageId) -> bool {
        self.images.get(&image).is_some_and(|r| r.mip_complete)
    }

    /// Check if any texture, placeholders included, is cached for the image.
    pub fn has_gpu_texture(&self, image: ImageId) -> bool {
        self.images.get(&image).is_some_and(|r| !r.slot.is_empty())
    }

    /// Get the texture of `image` for `target`, creating it if needed.
    ///
    /// Pending edits are uploaded before the lookup. Images without tiles or
    /// pixel data get a cached placeholder. Fails only when the backend
    /// cannot create the placeholder.
    pub fn acquire(
        &mut self,
        image: &Image,
        user: &ImageUser,
        target: TextureTarget,
    ) -> Result<GpuTextures> {
        self.flush_deferred();
        let now = self.clock.now_secs();
        let mode = self.auto_free_mode();
        let Self {
            backend,
            config,
            color,
            deferred,
            images,
            ..
        } = self;
        let record = images
            .entry(image.id())
            .or_insert_with(|| ImageRecord::new(image, now));

        // A changed pass, layer or view keeps the cached textures.
        let key = (user.pass, user.layer, user.view);
        if record.key.is_some_and(|old| old != key) {
            tracing::debug!(
                image = image.name(),
                pass = user.pass,
                layer = user.layer,
                view = user.view,
                "image user changed, cache kept"
            );
        }
        record.key = Some(key);
        let view = user.view_slot();

        sync_record(backend, deferred, &**color, config.mipmap, image, record, mode);
        record.last_used = now;

        if let Some(found) = record.slot.lookup(target, view) {
            return Ok(found);
        }

        let Some(first_tile) = image.first_tile() else {
            tracing::warn!(image = image.name(), "image has no tiles, using placeholder");
            return cache_placeholder(backend, deferred, record, target, user, mode);
        };
        let tile = match target {
            TextureTarget::Plain2D => first_tile,
            TextureTarget::Array2D | TextureTarget::TileMapping => user.tile.unwrap_or(first_tile),
        };
        let Some(buffer) = image.acquire_tile(user, tile) else {
            tracing::warn!(image = image.name(), tile = tile.0, "no image buffer, using placeholder");
            return cache_placeholder(backend, deferred, record, target, user, mode);
        };

        let builder = TileArrayBuilder::new(&**color)
            .with_resolution_limit(config.resolution_limit)
            .with_mipmap(config.mipmap);

        match target {
            TextureTarget::Plain2D => {
                let cached = match builder.build_single(backend, image, &buffer)? {
                    SingleBuild::Content {
                        texture,
                        mip_complete,
                    } => {
                        record.mip_complete |= mip_complete;
                        CachedTexture::content(texture, user.view)
                    }
                    SingleBuild::Placeholder(texture) => CachedTexture::placeholder(texture, user.view),
                };
                if let Some(old) = record.slot.insert(target, view, cached) {
                    release(backend, deferred, vec![old], mode);
                }
                Ok(GpuTextures {
                    texture: cached.acquired(),
                    tile_mapping: None,
                })
            }
            TextureTarget::Array2D | TextureTarget::TileMapping => {
                drop(buffer);
                // Array and mapping are rebuilt together.
                let stale: Vec<_> = [
                    record.slot.remove(TextureTarget::Array2D, view),
                    record.slot.remove(TextureTarget::TileMapping, view),
                ]
                .into_iter()
                .flatten()
                .collect();
                release(backend, deferred, stale, mode);

                let (array, mapping) = match builder.build_array(backend, image, user)? {
                    ArrayBuild::Content(built) => {
                        let mapping = build_mapping(backend, image, &built.layout, user.view)?;
                        record.mip_complete |= built.mip_complete;
                        record.slot.layouts.insert(view, built.layout);
                        (CachedTexture::content(built.texture, user.view), mapping)
                    }
                    ArrayBuild::Placeholder(texture) => {
                        let mapping = backend.create_error_texture(TextureDimension::D1Array)?;
                        (
                            CachedTexture::placeholder(texture, user.view),
                            CachedTexture::placeholder(mapping, user.view),
                        )
                    }
                };
                record.slot.insert(TextureTarget::Array2D, view, array);
                record.slot.insert(TextureTarget::TileMapping, view, mapping);
                Ok(pair_result(target, array, mapping))
            }
        }
    }

    /// Request a full rebuild of the image's textures on next access.
    pub fn invalidate_full(&mut self, image: &Image) {
        tracing::debug!(image = image.name(), "full update requested");
        self.record_mut(image).sync.mark_full();
    }

    /// Report a changed region of one tile.
    pub fn mark_region(&mut self, image: &Image, region: DirtyRegion) {
        tracing::trace!(
            image = image.name(),
            tile = region.tile.0,
            rect = ?region.rect,
            "region marked dirty"
        );
        self.record_mut(image).sync.mark_region(region);
    }

    /// Report a changed region of the tile selected by `user`.
    ///
    /// A region covering the whole buffer of a single-tile image becomes a
    /// full update.
    pub fn update_region(&mut self, image: &Image, user: &ImageUser, rect: PixelRect) {
        let Some(tile) = user.tile.or_else(|| image.first_tile()) else {
            return;
        };
        let whole = !image.is_tiled()
            && image
                .acquire_tile(user, tile)
                .is_some_and(|buffer| rect.covers(buffer.width(), buffer.height()));
        if whole {
            self.invalidate_full(image);
        } else {
            self.mark_region(image, DirtyRegion::new(tile, rect));
        }
    }

    /// Request a full rebuild if `user` selects content the cache cannot hold.
    ///
    /// [`Self::acquire`] keeps serving textures built for an older pass or
    /// layer; call this first to get fresh content. A view only triggers a
    /// rebuild when its slot holds textures read from another view.
    pub fn ensure_key(&mut self, image: &Image, user: &ImageUser) {
        let Some(record) = self.images.get(&image.id()) else {
            return;
        };
        let stale_key = record
            .key
            .is_some_and(|(pass, layer, _)| pass != user.pass || layer != user.layer);
        let slot = user.view_slot();
        let stale_view = record
            .slot
            .iter()
            .any(|(_, view, texture)| view == slot && texture.source_view != user.view);
        if stale_key || stale_view {
            self.invalidate_full(image);
        }
    }

    /// Keep the image out of garbage collection.
    pub fn set_no_collect(&mut self, image: &Image, no_collect: bool) {
        self.record_mut(image).no_collect = no_collect;
    }

    /// Release the image's textures. Returns how many were released.
    pub fn free(&mut self, image: ImageId, mode: FreeMode) -> usize {
        let Self {
            backend,
            deferred,
            images,
            ..
        } = self;
        let Some(record) = images.get_mut(&image) else {
            return 0;
        };
        let count = record.free_textures(backend, deferred, mode);
        if count > 0 {
            tracing::debug!(image = %record.name, count, ?mode, "image textures released");
        }
        count
    }

    /// Release the image's textures, deferring when off the owner thread.
    pub fn free_auto(&mut self, image: ImageId) -> usize {
        let mode = self.auto_free_mode();
        self.free(image, mode)
    }

    /// Release the textures of every image.
    pub fn free_all(&mut self, mode: FreeMode) -> usize {
        let ids: Vec<_> = self.images.keys().copied().collect();
        ids.into_iter().map(|id| self.free(id, mode)).sum()
    }

    /// Release the image's textures and forget it.
    pub fn remove_image(&mut self, image: ImageId) -> usize {
        let count = self.free_auto(image);
        self.images.remove(&image);
        count
    }

    /// Free textures queued from other threads. No-op off the owner thread.
    pub fn flush_deferred(&mut self) -> usize {
        self.deferred.flush(&mut self.backend)
    }

    /// Enable or disable mipmapped sampling on every cached texture.
    ///
    /// Enabling generates the chains that are missing.
    pub fn set_mipmap(&mut self, enabled: bool) {
        self.config.mipmap = enabled;
        let Self {
            backend, images, ..
        } = self;
        for record in images.values_mut() {
            let textures: Vec<_> = record
                .slot
                .iter()
                .filter(|(target, _, t)| *target != TextureTarget::TileMapping && !t.placeholder)
                .map(|(_, _, t)| t.id)
                .collect();
            if textures.is_empty() {
                continue;
            }
            let generate = enabled && !record.mip_complete;
            let result = textures.iter().try_for_each(|&texture| {
                if generate {
                    backend.generate_mipmaps(texture)?;
                }
                backend.set_mipmap_mode(texture, enabled, true)
            });
            match result {
                Ok(()) => record.mip_complete |= enabled,
                Err(err) => {
                    tracing::warn!(image = %record.name, %err, "mipmap mode change failed");
                }
            }
        }
    }

    /// Free GPU data of images unused for longer than the configured timeout.
    ///
    /// Images holding textures lose them and get a fresh usage timestamp;
    /// images without textures drop their pixel buffers instead.
    pub fn collect_garbage(&mut self, gc: &mut GcClock, context: GcContext) -> GcReport {
        let settings = self.config.gc;
        if !settings.is_enabled() {
            return GcReport::skipped(GcSkip::Disabled);
        }
        if context.is_rendering {
            return GcReport::skipped(GcSkip::Rendering);
        }
        let now = self.clock.now_secs();
        if !gc.is_due(now, settings.collect_interval_secs) {
            return GcReport::skipped(GcSkip::TooSoon);
        }
        gc.record_sweep(now);

        let mode = self.auto_free_mode();
        let Self {
            backend,
            deferred,
            images,
            ..
        } = self;
        let mut report = GcReport::default();
        for record in images.values_mut() {
            if record.no_collect || now.saturating_sub(record.last_used) <= settings.timeout_secs {
                continue;
            }
            if record.slot.is_empty() {
                record.source.free_buffers();
                report.buffers_freed += 1;
            } else {
                record.free_textures(backend, deferred, mode);
                record.last_used = now;
                report.textures_freed += 1;
            }
        }
        if report.freed_any() {
            tracing::debug!(
                textures = report.textures_freed,
                buffers = report.buffers_freed,
                "garbage collected"
            );
        }
        report
    }

    fn auto_free_mode(&self) -> FreeMode {
        if self.deferred.is_owner_thread() {
            FreeMode::Immediate
        } else {
            FreeMode::Deferred
        }
    }

    fn record_mut(&mut self, image: &Image) -> &mut ImageRecord {
        let now = self.clock.now_secs();
        self.images
            .entry(image.id())
            .or_insert_with(|| ImageRecord::new(image, now))
    }
}

/// Create and cache placeholders for `target`.
fn cache_placeholder<B: GpuBackend + ?Sized>(
    backend: &mut B,
    deferred: &DeferredFreeQueue,
    record: &mut ImageRecord,
    target: TextureTarget,
    user: &ImageUser,
    mode: FreeMode,
) -> Result<GpuTextures> {
    let view = user.view_slot();
    match target {
        TextureTarget::Plain2D => {
            let texture = CachedTexture::placeholder(
                backend.create_error_texture(target.error_dimension())?,
                user.view,
            );
            if let Some(old) = record.slot.insert(target, view, texture) {
                release(backend, deferred, vec![old], mode);
            }
            Ok(GpuTextures {
                texture: texture.acquired(),
                tile_mapping: None,
            })
        }
        TextureTarget::Array2D | TextureTarget::TileMapping => {
            let array = CachedTexture::placeholder(
                backend.create_error_texture(TextureTarget::Array2D.error_dimension())?,
                user.view,
            );
            let mapping = CachedTexture::placeholder(
                backend.create_error_texture(TextureTarget::TileMapping.error_dimension())?,
                user.view,
            );
            let stale: Vec<_> = [
                record.slot.insert(TextureTarget::Array2D, view, array),
                record.slot.insert(TextureTarget::TileMapping, view, mapping),
            ]
            .into_iter()
            .flatten()
            .collect();
            release(backend, deferred, stale, mode);
            Ok(pair_result(target, array, mapping))
        }
    }
}

/// Create the mapping texture for a fresh layout, or a placeholder.
fn build_mapping<B: GpuBackend + ?Sized>(
    backend: &mut B,
    image: &Image,
    layout: &PackedTileLayout,
    source_view: u16,
) -> Result<CachedTexture> {
    if let Some(mapping) = TileMapping::from_layout(layout) {
        match mapping.upload(backend, image.name()) {
            Ok(texture) => return Ok(CachedTexture::content(texture, source_view)),
            Err(err) => {
                tracing::warn!(image = image.name(), %err, "tile mapping creation failed");
            }
        }
    }
    let texture = backend.create_error_texture(TextureDimension::D1Array)?;
    Ok(CachedTexture::placeholder(texture, source_view))
}

/// Apply pending synchronization work of one image.
fn sync_record<B: GpuBackend + ?Sized>(
    backend: &mut B,
    deferred: &DeferredFreeQueue,
    color: &dyn ColorManagement,
    mipmap: bool,
    image: &Image,
    record: &mut ImageRecord,
    mode: FreeMode,
) {
    match record.sync.take() {
        SyncAction::None => {}
        SyncAction::Full => {
            let freed = record.free_textures(backend, deferred, mode);
            tracing::debug!(image = image.name(), freed, "full update, textures released");
        }
        SyncAction::Partial(regions) => {
            tracing::debug!(image = image.name(), regions = regions.len(), "applying partial update");
            for region in regions {
                if let Err(err) = apply_region(backend, color, mipmap, image, record, region) {
                    tracing::warn!(image = image.name(), %err, "partial update failed, rebuilding");
                    record.free_textures(backend, deferred, mode);
                    break;
                }
            }
        }
    }
}

/// Re-upload one dirty region into every cached texture holding its tile.
///
/// Each texture is refreshed from the view it was built from.
fn apply_region<B: GpuBackend + ?Sized>(
    backend: &mut B,
    color: &dyn ColorManagement,
    mipmap: bool,
    image: &Image,
    record: &mut ImageRecord,
    region: DirtyRegion,
) -> udim_gpu::Result<()> {
    let (pass, layer, _) = record.key.unwrap_or_default();
    let is_first_tile = image.first_tile() == Some(region.tile);

    let mut targets = Vec::new();
    for (target, slot_view, texture) in record.slot.iter() {
        if texture.placeholder {
            continue;
        }
        let dest = match target {
            TextureTarget::Plain2D if is_first_tile => TilePlacement {
                layer: 0,
                offset: UVec2::ZERO,
                size: backend.texture_size(texture.id)?,
            },
            TextureTarget::Array2D => {
                match record.slot.layout(slot_view).and_then(|l| l.placement(region.tile)) {
                    Some(placement) => *placement,
                    None => continue,
                }
            }
            TextureTarget::Plain2D | TextureTarget::TileMapping => continue,
        };
        targets.push((texture.id, texture.source_view, dest));
    }
    // Stable upload order.
    targets.sort_by_key(|&(id, _, _)| id);

    for (texture, source_view, dest) in targets {
        let user = ImageUser {
            tile: Some(region.tile),
            pass,
            layer,
            view: source_view,
        };
        let Some(buffer) = image.acquire_tile(&user, region.tile) else {
            tracing::debug!(image = image.name(), tile = region.tile.0, "dirty tile has no buffer");
            continue;
        };
        let Some(rect) = region.rect.clamp_to_size(buffer.width(), buffer.height()) else {
            tracing::trace!(tile = region.tile.0, rect = ?region.rect, "dirty region outside tile");
            continue;
        };
        let store_premultiplied = image.store_premultiplied(&buffer);

        let written = update_from_buffer(
            backend,
            texture,
            color,
            &buffer,
            rect,
            &dest,
            store_premultiplied,
        )?;
        if written.is_some() {
            if mipmap {
                backend.generate_mipmaps(texture)?;
            } else {
                record.mip_complete = false;
            }
        }
    }
    Ok(())
}
