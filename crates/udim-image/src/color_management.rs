//! Conversion of pixel buffers into upload-ready texel data.

use crate::buffer::{ImageBuffer, PixelData};
use crate::colorspace::{linear_to_srgb, ColorSpace};
use rayon::prelude::*;
use udim_core::PixelRect;

/// Converts a region of a buffer into packed RGBA texels.
///
/// Implementations must be pure: the same buffer and region always produce
/// the same texels. Output rows are `rect.width()` pixels long.
pub trait ColorManagement: Send + Sync {
    /// Convert to 8-bit RGBA.
    ///
    /// With `compress_as_srgb` color data is re-encoded to sRGB, otherwise it
    /// keeps its encoding. `store_premultiplied` premultiplies by alpha.
    fn to_byte_texture(
        &self,
        buffer: &ImageBuffer,
        rect: PixelRect,
        compress_as_srgb: bool,
        store_premultiplied: bool,
    ) -> Vec<u8>;

    /// Convert to scene-linear float RGBA.
    fn to_float_texture(
        &self,
        buffer: &ImageBuffer,
        rect: PixelRect,
        store_premultiplied: bool,
    ) -> Vec<f32>;
}

/// Default conversions using the built-in transfer functions.
///
/// Rows are converted in parallel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardColorManagement;

impl StandardColorManagement {
    pub const fn new() -> Self {
        Self
    }
}

impl ColorManagement for StandardColorManagement {
    fn to_byte_texture(
        &self,
        buffer: &ImageBuffer,
        rect: PixelRect,
        compress_as_srgb: bool,
        store_premultiplied: bool,
    ) -> Vec<u8> {
        let Some(rect) = rect.clamp_to_size(buffer.width(), buffer.height()) else {
            return Vec::new();
        };
        let row_len = 4 * rect.width() as usize;
        let mut out = vec![0u8; row_len * rect.height() as usize];
        let colorspace = buffer.colorspace();
        let reencode = compress_as_srgb && !colorspace.is_data() && !colorspace.is_srgb();

        out.par_chunks_mut(row_len).enumerate().for_each(|(row, dst)| {
            let y = (rect.ymin as usize + row) as u32;
            for (col, px) in dst.chunks_exact_mut(4).enumerate() {
                let x = (rect.xmin as usize + col) as u32;
                px.copy_from_slice(&byte_texel(buffer, x, y, colorspace, reencode, store_premultiplied));
            }
        });
        out
    }

    fn to_float_texture(
        &self,
        buffer: &ImageBuffer,
        rect: PixelRect,
        store_premultiplied: bool,
    ) -> Vec<f32> {
        let Some(rect) = rect.clamp_to_size(buffer.width(), buffer.height()) else {
            return Vec::new();
        };
        let row_len = 4 * rect.width() as usize;
        let mut out = vec![0.0f32; row_len * rect.height() as usize];
        let colorspace = buffer.colorspace();

        out.par_chunks_mut(row_len).enumerate().for_each(|(row, dst)| {
            let y = (rect.ymin as usize + row) as u32;
            for (col, px) in dst.chunks_exact_mut(4).enumerate() {
                let x = (rect.xmin as usize + col) as u32;
                px.copy_from_slice(&float_texel(buffer, x, y, colorspace, store_premultiplied));
            }
        });
        out
    }
}

fn byte_texel(
    buffer: &ImageBuffer,
    x: u32,
    y: u32,
    colorspace: ColorSpace,
    reencode: bool,
    premultiply: bool,
) -> [u8; 4] {
    match buffer.data() {
        PixelData::Bytes(data) => {
            let at = buffer.element_offset(x, y);
            let mut px = [data[at], data[at + 1], data[at + 2], data[at + 3]];
            if reencode {
                for c in &mut px[..3] {
                    *c = quantize(linear_to_srgb(colorspace.to_linear(f32::from(*c) / 255.0)));
                }
            }
            if premultiply {
                let alpha = u16::from(px[3]);
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * alpha + 127) / 255) as u8;
                }
            }
            px
        }
        PixelData::Floats(_) => {
            // Float data is premultiplied scene linear.
            let [r, g, b, a] = buffer.pixel(x, y);
            let mut rgb = if premultiply || a <= 0.0 {
                [r, g, b]
            } else {
                [r / a, g / a, b / a]
            };
            if reencode {
                for c in &mut rgb {
                    *c = linear_to_srgb(*c);
                }
            }
            [quantize(rgb[0]), quantize(rgb[1]), quantize(rgb[2]), quantize(a)]
        }
    }
}

fn float_texel(
    buffer: &ImageBuffer,
    x: u32,
    y: u32,
    colorspace: ColorSpace,
    premultiply: bool,
) -> [f32; 4] {
    let [r, g, b, a] = buffer.pixel(x, y);
    if buffer.is_float() {
        // Already scene linear and premultiplied.
        if premultiply || a <= 0.0 {
            [r, g, b, a]
        } else {
            [r / a, g / a, b / a, a]
        }
    } else {
        let mut rgb = [r, g, b].map(|c| colorspace.to_linear(c));
        if premultiply {
            for c in &mut rgb {
                *c *= a;
            }
        }
        [rgb[0], rgb[1], rgb[2], a]
    }
}

#[inline]
fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::srgb_to_linear;
    use approx::assert_relative_eq;

    fn two_pixel_buffer(colorspace: ColorSpace) -> ImageBuffer {
        ImageBuffer::from_bytes(2, 1, vec![200, 100, 50, 255, 255, 255, 255, 128], colorspace)
            .unwrap()
    }

    #[test]
    fn srgb_bytes_pass_through() {
        let cm = StandardColorManagement;
        let buf = two_pixel_buffer(ColorSpace::Srgb);
        let out = cm.to_byte_texture(&buf, buf.rect(), true, false);
        assert_eq!(out, buf.bytes().unwrap());
    }

    #[test]
    fn byte_premultiplication() {
        let cm = StandardColorManagement;
        let buf = two_pixel_buffer(ColorSpace::NonColor);
        let out = cm.to_byte_texture(&buf, PixelRect::new(1, 0, 2, 1), false, true);
        assert_eq!(out, vec![128, 128, 128, 128]);
    }

    #[test]
    fn byte_rect_is_packed_row_by_row() {
        let cm = StandardColorManagement;
        let data: Vec<u8> = (0..6u8).flat_map(|i| [i, i, i, 255]).collect();
        let buf = ImageBuffer::from_bytes(3, 2, data, ColorSpace::NonColor).unwrap();
        let out = cm.to_byte_texture(&buf, PixelRect::new(1, 0, 3, 2), false, false);
        let firsts: Vec<u8> = out.chunks_exact(4).map(|px| px[0]).collect();
        assert_eq!(firsts, vec![1, 2, 4, 5]);
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn gamma_bytes_are_reencoded_to_srgb() {
        let cm = StandardColorManagement;
        let buf = ImageBuffer::solid_bytes(1, 1, [128, 128, 128, 255], ColorSpace::Gamma22).unwrap();
        let out = cm.to_byte_texture(&buf, buf.rect(), true, false);
        let expected = quantize(linear_to_srgb((128.0f32 / 255.0).powf(2.2)));
        assert_eq!(out[0], expected);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn bytes_decode_to_linear_floats() {
        let cm = StandardColorManagement;
        let buf = two_pixel_buffer(ColorSpace::Srgb);
        let out = cm.to_float_texture(&buf, PixelRect::new(0, 0, 1, 1), true);
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out[0], srgb_to_linear(200.0 / 255.0), epsilon = 1e-6);
        assert_relative_eq!(out[3], 1.0);
    }

    #[test]
    fn float_conversion_expands_channels() {
        let cm = StandardColorManagement;
        let buf = ImageBuffer::from_floats(2, 2, 1, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let out = cm.to_float_texture(&buf, PixelRect::new(1, 1, 2, 2), true);
        assert_eq!(out, vec![0.4, 0.4, 0.4, 1.0]);
    }

    #[test]
    fn float_unpremultiply() {
        let cm = StandardColorManagement;
        let buf = ImageBuffer::solid_floats(1, 1, [0.25, 0.25, 0.25, 0.5]).unwrap();
        let straight = cm.to_float_texture(&buf, buf.rect(), false);
        assert_relative_eq!(straight[0], 0.5);
        let premul = cm.to_float_texture(&buf, buf.rect(), true);
        assert_relative_eq!(premul[0], 0.25);
    }

    #[test]
    fn rect_outside_buffer_is_empty() {
        let cm = StandardColorManagement;
        let buf = two_pixel_buffer(ColorSpace::Srgb);
        assert!(cm.to_float_texture(&buf, PixelRect::new(5, 5, 8, 8), true).is_empty());
    }
}
