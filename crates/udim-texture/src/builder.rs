//! Creation of GPU textures from image buffers.

use crate::image::{Image, ImageFlags};
use crate::packer::{PackRequest, PackedTileLayout, TilePacker, TilePlacement};
use crate::upload::{format_for_buffer, select_format, update_from_buffer};
use glam::UVec2;
use udim_core::math::limit_size;
use udim_core::{ImageUser, TileNumber};
use udim_gpu::{ExtendMode, GpuBackend, TextureDesc, TextureDimension, TextureId};
use udim_image::{ColorManagement, ColorSpace, ImageBuffer};

/// A populated array texture.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltArray {
    pub texture: TextureId,
    pub layout: PackedTileLayout,
    /// Mip chain was generated.
    pub mip_complete: bool,
}

/// Outcome of an array build.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayBuild {
    Content(BuiltArray),
    /// No tile could be uploaded; a 2D array error texture stands in.
    Placeholder(TextureId),
}

/// Outcome of a single texture build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleBuild {
    Content { texture: TextureId, mip_complete: bool },
    Placeholder(TextureId),
}

/// Format-relevant properties of the first tile.
#[derive(Debug, Clone, Copy)]
struct FirstTile {
    is_float: bool,
    colorspace: ColorSpace,
}

/// Builds array and single textures for an image.
pub struct TileArrayBuilder<'a> {
    color: &'a dyn ColorManagement,
    resolution_limit: u32,
    mipmap: bool,
}

impl<'a> TileArrayBuilder<'a> {
    pub fn new(color: &'a dyn ColorManagement) -> Self {
        Self {
            color,
            resolution_limit: 0,
            mipmap: true,
        }
    }

    /// Per-axis resolution limit (0 = backend maximum).
    #[must_use]
    pub const fn with_resolution_limit(mut self, limit: u32) -> Self {
        self.resolution_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_mipmap(mut self, mipmap: bool) -> Self {
        self.mipmap = mipmap;
        self
    }

    /// Pack every tile of `image` into a new 2D array texture and upload it.
    ///
    /// Tiles are read with `user`'s pass, layer and view. Tiles without a
    /// buffer are left out of the layout. Only failing to create the error
    /// texture is reported as an error.
    pub fn build_array<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        image: &Image,
        user: &ImageUser,
    ) -> udim_gpu::Result<ArrayBuild> {
        let limit = backend.capabilities().size_limit(self.resolution_limit);

        let mut requests = Vec::with_capacity(image.tiles().len());
        let mut first = None;
        let mut max_planes = 0;
        for &tile in image.tiles() {
            let Some(buffer) = image.acquire_tile(user, tile) else {
                tracing::debug!(image = image.name(), tile = tile.0, "tile has no buffer");
                continue;
            };
            requests.push(PackRequest::new(tile, buffer.width(), buffer.height()));
            max_planes = max_planes.max(buffer.planes());
            first.get_or_insert(FirstTile {
                is_float: buffer.is_float(),
                colorspace: buffer.colorspace(),
            });
        }
        let Some(first) = first else {
            tracing::warn!(image = image.name(), "no tile buffers, using placeholder");
            return placeholder(backend);
        };

        let layout = match TilePacker::new(limit).pack(&requests) {
            Ok(layout) => layout,
            Err(err) => {
                tracing::warn!(image = image.name(), %err, "tile packing failed");
                return placeholder(backend);
            }
        };

        let format = select_format(
            first.is_float,
            first.colorspace,
            image.flags().contains(ImageFlags::HIGH_BIT_DEPTH),
            max_planes <= 8,
        );
        let desc = TextureDesc::d2_array(
            image.name(),
            format,
            layout.width,
            layout.height,
            layout.layers,
        );
        let texture = match backend.create_texture(&desc, None) {
            Ok(texture) => texture,
            Err(err) => {
                tracing::warn!(image = image.name(), %err, "array texture creation failed");
                return placeholder(backend);
            }
        };

        for (tile, placement) in layout.iter() {
            if placement.is_empty() {
                continue;
            }
            if let Err(err) = self.upload_tile(backend, texture, image, user, tile, placement) {
                tracing::warn!(image = image.name(), tile = tile.0, %err, "tile upload failed");
                if let Err(err) = backend.free_texture(texture) {
                    tracing::warn!(texture = texture.0, %err, "texture free failed");
                }
                return placeholder(backend);
            }
        }

        let mip_complete = self.apply_mipmap_policy(backend, texture)?;
        tracing::debug!(
            image = image.name(),
            texture = texture.0,
            width = layout.width,
            height = layout.height,
            layers = layout.layers,
            tiles = layout.len(),
            ?format,
            "tile array built"
        );
        Ok(ArrayBuild::Content(BuiltArray {
            texture,
            layout,
            mip_complete,
        }))
    }

    /// Upload one buffer into a new plain 2D texture.
    ///
    /// Buffers above the resolution limit are downscaled. The texture
    /// repeats outside the unit square.
    pub fn build_single<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        image: &Image,
        buffer: &ImageBuffer,
    ) -> udim_gpu::Result<SingleBuild> {
        let limit = backend.capabilities().size_limit(self.resolution_limit);
        let size = limit_size(UVec2::new(buffer.width(), buffer.height()), limit);
        let format = format_for_buffer(buffer, image.flags().contains(ImageFlags::HIGH_BIT_DEPTH));
        let desc = TextureDesc::d2(image.name(), format, size.x, size.y);

        let texture = match backend.create_texture(&desc, None) {
            Ok(texture) => texture,
            Err(err) => {
                tracing::warn!(image = image.name(), %err, "texture creation failed");
                return backend
                    .create_error_texture(TextureDimension::D2)
                    .map(SingleBuild::Placeholder);
            }
        };
        let dest = TilePlacement {
            layer: 0,
            offset: UVec2::ZERO,
            size,
        };
        let upload = update_from_buffer(
            backend,
            texture,
            self.color,
            buffer,
            buffer.rect(),
            &dest,
            image.store_premultiplied(buffer),
        )
        .and_then(|_| backend.set_extend_mode(texture, ExtendMode::Repeat));
        if let Err(err) = upload {
            tracing::warn!(image = image.name(), %err, "texture upload failed");
            if let Err(err) = backend.free_texture(texture) {
                tracing::warn!(texture = texture.0, %err, "texture free failed");
            }
            return backend
                .create_error_texture(TextureDimension::D2)
                .map(SingleBuild::Placeholder);
        }

        let mip_complete = self.apply_mipmap_policy(backend, texture)?;
        tracing::debug!(
            image = image.name(),
            texture = texture.0,
            width = size.x,
            height = size.y,
            ?format,
            "texture built"
        );
        Ok(SingleBuild::Content {
            texture,
            mip_complete,
        })
    }

    fn upload_tile<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        texture: TextureId,
        image: &Image,
        user: &ImageUser,
        tile: TileNumber,
        placement: &TilePlacement,
    ) -> udim_gpu::Result<()> {
        // The buffer may have been freed since it was measured.
        let Some(buffer) = image.acquire_tile(user, tile) else {
            tracing::debug!(image = image.name(), tile = tile.0, "tile buffer vanished");
            return Ok(());
        };
        update_from_buffer(
            backend,
            texture,
            self.color,
            &buffer,
            buffer.rect(),
            placement,
            image.store_premultiplied(&buffer),
        )?;
        Ok(())
    }

    /// Generate mips or disable mipmapped sampling. Returns `mip_complete`.
    fn apply_mipmap_policy<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        texture: TextureId,
    ) -> udim_gpu::Result<bool> {
        if self.mipmap {
            backend.generate_mipmaps(texture)?;
            backend.set_mipmap_mode(texture, true, true)?;
            Ok(true)
        } else {
            backend.set_mipmap_mode(texture, false, true)?;
            Ok(false)
        }
    }
}

fn placeholder<B: GpuBackend + ?Sized>(backend: &mut B) -> udim_gpu::Result<ArrayBuild> {
    backend
        .create_error_texture(TextureDimension::D2Array)
        .map(ArrayBuild::Placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use udim_gpu::{GpuCommand, SoftwareBackend, TextureFormat};
    use udim_image::{MemoryTileSource, StandardColorManagement, TileSource};

    fn udim(sizes: &[(u32, u32, u32)]) -> (Image, Arc<MemoryTileSource>) {
        let source = Arc::new(MemoryTileSource::new());
        for &(tile, w, h) in sizes {
            source.insert(
                TileNumber(tile),
                ImageBuffer::solid_bytes(w, h, [10, 20, 30, 255], ColorSpace::NonColor).unwrap(),
            );
        }
        let tiles = sizes.iter().map(|&(tile, _, _)| TileNumber(tile));
        let image = Image::tiled("udim", tiles, Arc::clone(&source) as Arc<dyn TileSource>);
        (image, source)
    }

    #[test]
    fn array_contains_every_tile() {
        let (image, _) = udim(&[(1001, 512, 512), (1002, 256, 256), (1003, 1024, 512)]);
        let mut backend = SoftwareBackend::default();
        let color = StandardColorManagement;
        let build = TileArrayBuilder::new(&color)
            .build_array(&mut backend, &image, &ImageUser::default())
            .unwrap();
        let ArrayBuild::Content(built) = build else {
            panic!("expected content, got {build:?}");
        };
        assert_eq!(built.layout.len(), 3);
        assert!(built.mip_complete);
        let desc = backend.desc(built.texture).unwrap();
        assert_eq!(desc.dimension, TextureDimension::D2Array);
        assert_eq!(desc.format, TextureFormat::Rgba8);
        assert_eq!(
            (desc.width, desc.height, desc.layers),
            (built.layout.width, built.layout.height, built.layout.layers)
        );

        let small = built.layout.placement(TileNumber(1002)).unwrap();
        let texel = backend
            .texel(built.texture, small.offset.x + 5, small.offset.y + 5, small.layer)
            .unwrap();
        approx::assert_relative_eq!(texel[0], 10.0 / 255.0);
        assert_eq!(backend.mipmap_mode(built.texture), Some((true, true)));
    }

    #[test]
    fn missing_buffers_are_skipped() {
        let (mut image, _) = udim(&[(1001, 64, 64)]);
        image.add_tile(TileNumber(1004));
        let mut backend = SoftwareBackend::default();
        let color = StandardColorManagement;
        let build = TileArrayBuilder::new(&color)
            .with_mipmap(false)
            .build_array(&mut backend, &image, &ImageUser::default())
            .unwrap();
        let ArrayBuild::Content(built) = build else {
            panic!("expected content");
        };
        assert!(built.layout.placement(TileNumber(1004)).is_none());
        assert!(!built.mip_complete);
        assert_eq!(backend.mip_generations(built.texture), 0);
    }

    #[test]
    fn no_buffers_yields_placeholder() {
        let source: Arc<dyn TileSource> = Arc::new(MemoryTileSource::new());
        let image = Image::tiled("empty", [TileNumber(1001), TileNumber(1002)], source);
        let mut backend = SoftwareBackend::default();
        let color = StandardColorManagement;
        let build = TileArrayBuilder::new(&color)
            .build_array(&mut backend, &image, &ImageUser::default())
            .unwrap();
        let ArrayBuild::Placeholder(texture) = build else {
            panic!("expected placeholder");
        };
        assert!(backend.is_error_texture(texture));
        assert_eq!(
            backend.commands(),
            &[GpuCommand::CreateError {
                texture,
                dimension: TextureDimension::D2Array
            }]
        );
    }

    #[test]
    fn oversized_tiles_are_downscaled() {
        let (image, _) = udim(&[(1001, 256, 64), (1002, 64, 64)]);
        let mut backend = SoftwareBackend::default();
        let color = StandardColorManagement;
        let build = TileArrayBuilder::new(&color)
            .with_resolution_limit(100)
            .build_array(&mut backend, &image, &ImageUser::default())
            .unwrap();
        let ArrayBuild::Content(built) = build else {
            panic!("expected content");
        };
        let big = built.layout.placement(TileNumber(1001)).unwrap();
        assert_eq!(big.size, UVec2::new(64, 64));
        assert_eq!(built.layout.extent(), UVec2::new(64, 64));
        assert_eq!(built.layout.layers, 2);
    }

    #[test]
    fn single_texture_repeats_and_is_limited() {
        let source: Arc<dyn TileSource> = Arc::new(MemoryTileSource::new());
        let image = Image::new("single", source);
        let buffer = ImageBuffer::solid_floats(300, 120, [0.5, 0.5, 0.5, 1.0]).unwrap();
        let mut backend = SoftwareBackend::default();
        let color = StandardColorManagement;
        let build = TileArrayBuilder::new(&color)
            .with_resolution_limit(128)
            .build_single(&mut backend, &image, &buffer)
            .unwrap();
        let SingleBuild::Content { texture, mip_complete } = build else {
            panic!("expected content");
        };
        assert!(mip_complete);
        assert_eq!(backend.texture_size(texture).unwrap(), UVec2::new(128, 64));
        assert_eq!(backend.extend_mode(texture), Some(ExtendMode::Repeat));
        assert_eq!(backend.desc(texture).unwrap().format, TextureFormat::Rgba16F);
        let texel = backend.texel(texture, 10, 10, 0).unwrap();
        approx::assert_relative_eq!(texel[1], 0.5, epsilon = 1e-5);
    }
}
