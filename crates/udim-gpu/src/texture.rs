//! Texture descriptors and upload types.

use crate::error::{GpuError, Result};

/// Opaque handle to a backend texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TextureId(pub u64);

/// Dimensionality of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// Array of 1D rows (`width x layers`).
    D1Array,
    /// Single 2D image.
    D2,
    /// Array of equally sized 2D layers.
    D2Array,
}

/// Storage format of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rgba8,
    Srgb8A8,
    R16F,
    Rgba16F,
    R32F,
    Rgba32F,
}

impl TextureFormat {
    /// Number of channels stored per texel.
    pub const fn channels(self) -> u32 {
        match self {
            Self::R8 | Self::R16F | Self::R32F => 1,
            Self::Rgba8 | Self::Srgb8A8 | Self::Rgba16F | Self::Rgba32F => 4,
        }
    }

    /// True for floating-point formats.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::R16F | Self::Rgba16F | Self::R32F | Self::Rgba32F)
    }
}

/// Sampler wrap behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExtendMode {
    #[default]
    Extend,
    Repeat,
    Mirror,
    ClampToBorder,
}

/// Parameters for creating a texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub width: u32,
    /// Height; 1 for 1D arrays.
    pub height: u32,
    /// Layer count; 1 for plain 2D textures.
    pub layers: u32,
}

impl TextureDesc {
    /// Describe a plain 2D texture.
    pub fn d2(label: impl Into<String>, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            dimension: TextureDimension::D2,
            format,
            width,
            height,
            layers: 1,
        }
    }

    /// Describe a 2D array texture.
    pub fn d2_array(
        label: impl Into<String>,
        format: TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
    ) -> Self {
        Self {
            label: label.into(),
            dimension: TextureDimension::D2Array,
            format,
            width,
            height,
            layers,
        }
    }

    /// Describe a 1D array texture with `rows` rows.
    pub fn d1_array(label: impl Into<String>, format: TextureFormat, width: u32, rows: u32) -> Self {
        Self {
            label: label.into(),
            dimension: TextureDimension::D1Array,
            format,
            width,
            height: 1,
            layers: rows,
        }
    }

    /// Number of texels across all layers.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.layers as usize
    }
}

/// Destination of a sub-region upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UploadRegion {
    pub x: u32,
    pub y: u32,
    /// Target layer; 0 for plain 2D textures.
    pub layer: u32,
    pub width: u32,
    pub height: u32,
}

impl UploadRegion {
    #[inline]
    pub const fn new(x: u32, y: u32, layer: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            layer,
            width,
            height,
        }
    }

    /// True if no texel is written.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Texel data in host memory, always RGBA interleaved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TexelData<'a> {
    Bytes(&'a [u8]),
    Floats(&'a [f32]),
}

impl TexelData<'_> {
    /// Number of scalar elements.
    pub const fn len(&self) -> usize {
        match self {
            Self::Bytes(data) => data.len(),
            Self::Floats(data) => data.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one normalized RGBA texel at element offset `at`.
    #[inline]
    pub fn texel(&self, at: usize) -> [f32; 4] {
        match self {
            Self::Bytes(data) => {
                let px = &data[at..at + 4];
                [
                    f32::from(px[0]) / 255.0,
                    f32::from(px[1]) / 255.0,
                    f32::from(px[2]) / 255.0,
                    f32::from(px[3]) / 255.0,
                ]
            }
            Self::Floats(data) => [data[at], data[at + 1], data[at + 2], data[at + 3]],
        }
    }
}

/// Source data of an upload with its unpack layout.
///
/// `row_length` (in pixels) and `offset` (in elements) allow a region to be
/// read directly out of a larger buffer without copying it first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexelUpload<'a> {
    pub data: TexelData<'a>,
    pub row_length: u32,
    pub offset: usize,
}

impl<'a> TexelUpload<'a> {
    /// Tightly packed data whose rows are `row_length` pixels long.
    pub const fn packed(data: TexelData<'a>, row_length: u32) -> Self {
        Self {
            data,
            row_length,
            offset: 0,
        }
    }

    /// Data read out of a larger `row_length` wide buffer, starting at `offset`.
    pub const fn strided(data: TexelData<'a>, row_length: u32, offset: usize) -> Self {
        Self {
            data,
            row_length,
            offset,
        }
    }

    /// Element offset of pixel `(x, y)` of the region.
    #[inline]
    pub const fn element_offset(&self, x: u32, y: u32) -> usize {
        self.offset + 4 * (y as usize * self.row_length as usize + x as usize)
    }

    /// Check the data covers a `width x height` region.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if self.row_length < width {
            return Err(GpuError::OutOfBounds(format!(
                "row length {} shorter than region width {width}",
                self.row_length
            )));
        }
        let expected = self.element_offset(width - 1, height - 1) + 4;
        if self.data.len() < expected {
            return Err(GpuError::DataTooShort {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_upload_offsets() {
        let data = vec![0.0f32; 4 * 16 * 16];
        let upload = TexelUpload::strided(TexelData::Floats(&data), 16, 4 * (2 * 16 + 3));
        assert_eq!(upload.element_offset(0, 0), 4 * 35);
        assert_eq!(upload.element_offset(1, 1), 4 * (35 + 17));
        assert!(upload.validate(13, 14).is_ok());
        assert!(upload.validate(13, 15).is_err());
    }

    #[test]
    fn byte_texels_are_normalized() {
        let data = [255u8, 0, 51, 255];
        let texel = TexelData::Bytes(&data).texel(0);
        approx::assert_relative_eq!(texel[0], 1.0);
        approx::assert_relative_eq!(texel[2], 0.2);
    }

    #[test]
    fn format_channels() {
        assert_eq!(TextureFormat::R16F.channels(), 1);
        assert_eq!(TextureFormat::Srgb8A8.channels(), 4);
        assert!(TextureFormat::Rgba32F.is_float());
        assert!(!TextureFormat::Rgba8.is_float());
    }
}
