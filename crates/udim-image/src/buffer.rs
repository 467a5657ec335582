//! In-memory pixel buffers.

use crate::colorspace::ColorSpace;
use crate::error::{ImageError, Result};
use udim_core::PixelRect;

/// Pixel storage of a buffer.
///
/// Byte buffers are always RGBA with straight alpha. Float buffers hold 1, 3
/// or 4 channels; 4-channel float data is premultiplied.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelData {
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
}

/// A decoded image tile.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    channels: u32,
    data: PixelData,
    colorspace: ColorSpace,
}

impl ImageBuffer {
    /// Create an RGBA byte buffer.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>, colorspace: ColorSpace) -> Result<Self> {
        check_dimensions(width, height)?;
        check_length(width, height, 4, data.len())?;
        Ok(Self {
            width,
            height,
            channels: 4,
            data: PixelData::Bytes(data),
            colorspace,
        })
    }

    /// Create a scene-linear float buffer with 1, 3 or 4 channels.
    pub fn from_floats(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Result<Self> {
        check_dimensions(width, height)?;
        if !matches!(channels, 1 | 3 | 4) {
            return Err(ImageError::UnsupportedChannels(channels));
        }
        check_length(width, height, channels, data.len())?;
        Ok(Self {
            width,
            height,
            channels,
            data: PixelData::Floats(data),
            colorspace: ColorSpace::SceneLinear,
        })
    }

    /// Byte buffer filled with one color.
    pub fn solid_bytes(width: u32, height: u32, rgba: [u8; 4], colorspace: ColorSpace) -> Result<Self> {
        let data = rgba.repeat(width as usize * height as usize);
        Self::from_bytes(width, height, data, colorspace)
    }

    /// RGBA float buffer filled with one (premultiplied) color.
    pub fn solid_floats(width: u32, height: u32, rgba: [f32; 4]) -> Result<Self> {
        let data = rgba.repeat(width as usize * height as usize);
        Self::from_floats(width, height, 4, data)
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub const fn channels(&self) -> u32 {
        self.channels
    }

    /// Bits per pixel across all channels (8 per channel).
    #[inline]
    pub const fn planes(&self) -> u32 {
        self.channels * 8
    }

    #[inline]
    pub const fn colorspace(&self) -> ColorSpace {
        self.colorspace
    }

    /// Retag the colorspace.
    #[must_use]
    pub fn with_colorspace(mut self, colorspace: ColorSpace) -> Self {
        self.colorspace = colorspace;
        self
    }

    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self.data, PixelData::Floats(_))
    }

    pub const fn data(&self) -> &PixelData {
        &self.data
    }

    /// Byte pixels, if this is a byte buffer.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            PixelData::Bytes(data) => Some(data),
            PixelData::Floats(_) => None,
        }
    }

    /// Float pixels, if this is a float buffer.
    pub fn floats(&self) -> Option<&[f32]> {
        match &self.data {
            PixelData::Floats(data) => Some(data),
            PixelData::Bytes(_) => None,
        }
    }

    /// Whole-buffer rectangle.
    #[inline]
    pub const fn rect(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }

    /// Element offset of pixel `(x, y)`.
    #[inline]
    pub const fn element_offset(&self, x: u32, y: u32) -> usize {
        self.channels as usize * (y as usize * self.width as usize + x as usize)
    }

    /// Raw channel values of one pixel, normalized to 0..1 for bytes.
    ///
    /// Missing channels are filled from the gray value, alpha defaults to 1.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let at = self.element_offset(x, y);
        match &self.data {
            PixelData::Bytes(data) => [
                f32::from(data[at]) / 255.0,
                f32::from(data[at + 1]) / 255.0,
                f32::from(data[at + 2]) / 255.0,
                f32::from(data[at + 3]) / 255.0,
            ],
            PixelData::Floats(data) => match self.channels {
                1 => [data[at], data[at], data[at], 1.0],
                3 => [data[at], data[at + 1], data[at + 2], 1.0],
                _ => [data[at], data[at + 1], data[at + 2], data[at + 3]],
            },
        }
    }

    /// Paint a rectangle with one color, clipped to the buffer.
    ///
    /// Byte buffers receive the color quantized to 8 bits.
    pub fn fill_rect(&mut self, rect: PixelRect, rgba: [f32; 4]) {
        let Some(rect) = rect.clamp_to_size(self.width, self.height) else {
            return;
        };
        let channels = self.channels as usize;
        let width = self.width as usize;
        for y in rect.ymin as usize..rect.ymax as usize {
            for x in rect.xmin as usize..rect.xmax as usize {
                let at = channels * (y * width + x);
                match &mut self.data {
                    PixelData::Bytes(data) => {
                        for (c, value) in rgba.iter().enumerate() {
                            data[at + c] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
                        }
                    }
                    PixelData::Floats(data) => {
                        data[at..at + channels].copy_from_slice(&rgba[..channels]);
                    }
                }
            }
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    Ok(())
}

fn check_length(width: u32, height: u32, channels: u32, actual: usize) -> Result<()> {
    let expected = width as usize * height as usize * channels as usize;
    if expected != actual {
        return Err(ImageError::DataLength { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_buffer_requires_rgba_length() {
        assert!(ImageBuffer::from_bytes(2, 2, vec![0; 16], ColorSpace::Srgb).is_ok());
        assert!(matches!(
            ImageBuffer::from_bytes(2, 2, vec![0; 12], ColorSpace::Srgb),
            Err(ImageError::DataLength { expected: 16, actual: 12 })
        ));
    }

    #[test]
    fn float_buffer_channels() {
        assert!(ImageBuffer::from_floats(2, 2, 2, vec![0.0; 8]).is_err());
        let gray = ImageBuffer::from_floats(2, 1, 1, vec![0.25, 0.5]).unwrap();
        assert_eq!(gray.planes(), 8);
        assert_eq!(gray.pixel(1, 0), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(ImageBuffer::solid_floats(0, 4, [0.0; 4]).is_err());
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut buf = ImageBuffer::solid_bytes(4, 4, [0, 0, 0, 255], ColorSpace::Srgb).unwrap();
        buf.fill_rect(PixelRect::new(2, 2, 10, 10), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(buf.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(buf.pixel(1, 1), [0.0, 0.0, 0.0, 1.0]);
    }
}
