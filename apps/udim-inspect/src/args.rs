//! Command line options.

use std::path::PathBuf;
use udim_core::{PixelRect, TileNumber};

/// Options of one inspect run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectArgs {
    /// Path pattern containing the `<UDIM>` token.
    pub pattern: String,
    /// Per-axis resolution limit; 0 uses the device limit.
    pub limit: u32,
    pub mipmap: bool,
    /// Treat tiles as non-color data.
    pub non_color: bool,
    /// Region to repaint after the first upload.
    pub paint: Option<(TileNumber, PixelRect)>,
    /// Directory receiving one PNG per array layer.
    pub dump_dir: Option<PathBuf>,
}

impl Default for InspectArgs {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            limit: 0,
            mipmap: true,
            non_color: false,
            paint: None,
            dump_dir: None,
        }
    }
}

impl InspectArgs {
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_args(&args)
    }

    /// Parse from a slice of arguments, the first being the program name.
    pub fn parse_args(args: &[String]) -> Self {
        let mut parsed = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-l" | "--limit" => {
                    if let Some(v) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                        parsed.limit = v;
                        i += 1;
                    }
                }
                "--no-mipmap" => parsed.mipmap = false,
                "--non-color" => parsed.non_color = true,
                "-p" | "--paint" => {
                    if let Some(paint) = args.get(i + 1).and_then(|v| parse_paint(v)) {
                        parsed.paint = Some(paint);
                        i += 1;
                    }
                }
                "-d" | "--dump" => {
                    if let Some(dir) = args.get(i + 1) {
                        parsed.dump_dir = Some(PathBuf::from(dir));
                        i += 1;
                    }
                }
                arg if !arg.starts_with('-') && parsed.pattern.is_empty() => {
                    parsed.pattern = arg.to_string();
                }
                _ => {}
            }
            i += 1;
        }

        parsed
    }
}

/// Parse `TILE:X,Y,W,H`, e.g. `1002:10,10,32,32`.
pub fn parse_paint(s: &str) -> Option<(TileNumber, PixelRect)> {
    let (tile, rect) = s.split_once(':')?;
    let tile = TileNumber::new(tile.trim().parse().ok()?).ok()?;
    let values: Vec<i32> = rect
        .split(',')
        .map(|v| v.trim().parse().ok())
        .collect::<Option<_>>()?;
    let [x, y, w, h] = values[..] else {
        return None;
    };
    if w <= 0 || h <= 0 {
        return None;
    }
    Some((tile, PixelRect::from_origin_size(x, y, w, h)))
}
