//! UDIM Tile Set Inspector
//!
//! Packs the tiles of a UDIM image into a texture array on the software GPU
//! backend and prints where each tile landed.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p udim-inspect -- <PATTERN> [OPTIONS]
//! ```
//!
//! ## Examples
//!
//! ```bash
//! # Pack every textures/skin.<UDIM>.png tile
//! cargo run -p udim-inspect -- "textures/skin.<UDIM>.png"
//!
//! # Limit tiles to 1024px, repaint a region of tile 1002 and dump the layers
//! cargo run -p udim-inspect -- "textures/skin.<UDIM>.png" -l 1024 -p 1002:0,0,64,64 -d out
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod args;
mod tiles;

use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use udim_core::{ImageUser, PixelRect, TileNumber};
use udim_gpu::{GpuBackend, GpuCommand, SoftwareBackend, TextureId};
use udim_image::{ColorSpace, MemoryTileSource, TileSource};
use udim_texture::{
    DirtyRegion, Image, PackedTileLayout, TextureCache, TextureCacheConfig, TextureTarget,
    TileMapping,
};

use crate::args::InspectArgs;
use crate::tiles::{file_source, TilePattern};

/// Color written by `--paint`.
const PAINT_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = InspectArgs::from_args();
    if args.pattern.is_empty() {
        print_help();
        bail!("missing tile pattern");
    }

    let pattern = TilePattern::parse(&args.pattern)?;
    let tiles = pattern.discover()?;
    if tiles.is_empty() {
        bail!("no tiles match {}", args.pattern);
    }
    info!("Found {} tiles matching {}", tiles.len(), args.pattern);

    let colorspace = if args.non_color {
        ColorSpace::NonColor
    } else {
        ColorSpace::Srgb
    };
    let source = Arc::new(file_source(pattern, colorspace));
    let image = Image::tiled(
        args.pattern.clone(),
        tiles,
        Arc::clone(&source) as Arc<dyn TileSource>,
    );

    let config = TextureCacheConfig::default()
        .with_resolution_limit(args.limit)
        .with_mipmap(args.mipmap);
    let mut cache = TextureCache::new(SoftwareBackend::default(), config);
    let user = ImageUser::default();

    let textures = cache.acquire(&image, &user, TextureTarget::Array2D)?;
    if textures.texture.is_placeholder() {
        bail!("no tile could be uploaded");
    }
    let array = textures.texture.id();
    let layout = cache
        .slot(image.id())
        .and_then(|slot| slot.layout(0))
        .context("array texture has no layout")?
        .clone();
    print_layout(&layout);

    if let Some((tile, rect)) = args.paint {
        repaint(&mut cache, &image, &source, tile, rect)?;
    }

    if let Some(dir) = &args.dump_dir {
        dump_layers(cache.backend(), array, &layout, dir)?;
    }

    Ok(())
}

fn print_layout(layout: &PackedTileLayout) {
    let extent = layout.extent();
    println!(
        "array: {}x{} x {} layers, {} tiles",
        extent.x,
        extent.y,
        layout.layers,
        layout.len()
    );
    println!("{:>6}  {:>5}  {:>11}  {:>11}", "tile", "layer", "offset", "size");
    for (tile, placement) in layout.iter() {
        println!(
            "{:>6}  {:>5}  {:>5},{:<5}  {:>5}x{:<5}",
            tile,
            placement.layer,
            placement.offset.x,
            placement.offset.y,
            placement.size.x,
            placement.size.y
        );
    }

    if let Some(mapping) = TileMapping::from_layout(layout) {
        let used = layout
            .iter()
            .filter(|(tile, _)| mapping.lookup(*tile).is_some())
            .count();
        println!("mapping: {} entries, {} in use", mapping.width(), used);
    }
}

/// Paint a region, then let the cache upload only that region.
fn repaint(
    cache: &mut TextureCache<SoftwareBackend>,
    image: &Image,
    source: &MemoryTileSource,
    tile: TileNumber,
    rect: PixelRect,
) -> anyhow::Result<()> {
    if !source.edit(tile, |buffer| buffer.fill_rect(rect, PAINT_COLOR)) {
        bail!("tile {tile} is not loaded");
    }
    cache.mark_region(image, DirtyRegion::new(tile, rect));
    cache.backend_mut().take_commands();
    cache.acquire(image, &ImageUser::default(), TextureTarget::Array2D)?;

    for command in cache.backend_mut().take_commands() {
        if let GpuCommand::UpdateSub { region, .. } = command {
            println!(
                "repainted tile {tile}: layer {} at {},{} size {}x{}",
                region.layer, region.x, region.y, region.width, region.height
            );
        }
    }
    Ok(())
}

fn dump_layers(
    backend: &SoftwareBackend,
    array: TextureId,
    layout: &PackedTileLayout,
    dir: &Path,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let texels = backend.read_back(array)?;
    let extent = layout.extent();
    let (width, height) = (extent.x as usize, extent.y as usize);

    for layer in 0..layout.layers as usize {
        let base = layer * width * height;
        let img = image::RgbaImage::from_fn(extent.x, extent.y, |x, y| {
            let at = (base + y as usize * width + x as usize) * 4;
            let mut rgba = [0u8; 4];
            for (c, out) in rgba.iter_mut().enumerate() {
                *out = (texels[at + c].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            image::Rgba(rgba)
        });
        let path = dir.join(format!("layer_{layer}.png"));
        img.save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        "UDIM Tile Set Inspector

USAGE:
    cargo run -p udim-inspect -- <PATTERN> [OPTIONS]

ARGUMENTS:
    <PATTERN>               Tile path with a <UDIM> token, e.g. \"skin.<UDIM>.png\"

OPTIONS:
    -l, --limit <N>         Per-axis resolution limit in pixels (default: device limit)
    --no-mipmap             Skip mip chain generation
    --non-color             Treat tiles as non-color data
    -p, --paint <SPEC>      Repaint TILE:X,Y,W,H after packing and report the upload
                            Example: 1002:0,0,64,64
    -d, --dump <DIR>        Write every array layer as PNG into DIR
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
