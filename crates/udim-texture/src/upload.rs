//! Texture format selection and buffer uploads.

use crate::packer::TilePlacement;
use glam::UVec2;
use udim_core::constants::SCALED_UPDATE_PADDING;
use udim_core::math::scale_span;
use udim_core::PixelRect;
use udim_gpu::{GpuBackend, TexelData, TexelUpload, TextureFormat, TextureId, UploadRegion};
use udim_image::{
    resample_rgba_f32, resample_rgba_u8, ColorManagement, ColorSpace, ImageBuffer, PixelData,
};

/// GPU storage format for a buffer.
///
/// `grayscale` selects single-channel formats for color data.
pub fn select_format(
    is_float: bool,
    colorspace: ColorSpace,
    high_bit_depth: bool,
    grayscale: bool,
) -> TextureFormat {
    if is_float {
        return match (high_bit_depth, grayscale) {
            (true, true) => TextureFormat::R32F,
            (true, false) => TextureFormat::Rgba32F,
            (false, true) => TextureFormat::R16F,
            (false, false) => TextureFormat::Rgba16F,
        };
    }
    match colorspace {
        ColorSpace::NonColor | ColorSpace::SceneLinear if grayscale => TextureFormat::R8,
        ColorSpace::NonColor | ColorSpace::SceneLinear => TextureFormat::Rgba8,
        ColorSpace::Srgb if grayscale => TextureFormat::R16F,
        ColorSpace::Srgb => TextureFormat::Srgb8A8,
        // Other encodings are decoded to half float to keep precision.
        _ if grayscale => TextureFormat::R16F,
        _ => TextureFormat::Rgba16F,
    }
}

/// [`select_format`] for a single buffer.
pub fn format_for_buffer(buffer: &ImageBuffer, high_bit_depth: bool) -> TextureFormat {
    select_format(
        buffer.is_float(),
        buffer.colorspace(),
        high_bit_depth,
        buffer.planes() <= 8,
    )
}

/// How a buffer region is turned into texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Upload straight out of the buffer.
    Raw,
    /// Convert to 8-bit RGBA.
    Bytes { compress_as_srgb: bool },
    /// Convert to scene-linear float RGBA.
    Floats,
}

/// Pick the conversion for uploading `buffer`.
///
/// `scaled` is set when the texture is smaller than the buffer.
pub fn choose_conversion(buffer: &ImageBuffer, scaled: bool, store_premultiplied: bool) -> Conversion {
    let colorspace = buffer.colorspace();
    if buffer.is_float() {
        // Float data is scene linear or non-color by convention.
        if buffer.channels() == 4 && !scaled && store_premultiplied {
            Conversion::Raw
        } else {
            Conversion::Floats
        }
    } else if colorspace.is_data() && !scaled {
        Conversion::Raw
    } else if colorspace.is_srgb() || colorspace.is_scene_linear() || colorspace.is_data() {
        Conversion::Bytes {
            compress_as_srgb: !colorspace.is_scene_linear(),
        }
    } else {
        Conversion::Floats
    }
}

/// Converted texels owned by the upload.
enum Texels {
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
}

impl Texels {
    fn convert(
        color: &dyn ColorManagement,
        buffer: &ImageBuffer,
        rect: PixelRect,
        conversion: Conversion,
        store_premultiplied: bool,
    ) -> Self {
        match conversion {
            Conversion::Bytes { compress_as_srgb } => Self::Bytes(color.to_byte_texture(
                buffer,
                rect,
                compress_as_srgb,
                store_premultiplied,
            )),
            Conversion::Raw | Conversion::Floats => {
                Self::Floats(color.to_float_texture(buffer, rect, store_premultiplied))
            }
        }
    }

    fn resampled(self, from: UVec2, to: UVec2) -> Self {
        match self {
            Self::Bytes(data) => Self::Bytes(resample_rgba_u8(&data, from.x, from.y, to.x, to.y)),
            Self::Floats(data) => {
                Self::Floats(resample_rgba_f32(&data, from.x, from.y, to.x, to.y))
            }
        }
    }

    fn data(&self) -> TexelData<'_> {
        match self {
            Self::Bytes(data) => TexelData::Bytes(data),
            Self::Floats(data) => TexelData::Floats(data),
        }
    }
}

/// Upload a region of `buffer` into the part of `texture` described by `dest`.
///
/// `rect` is in buffer pixels and is clipped to the buffer. When `dest.size`
/// differs from the buffer size the region is padded, converted and
/// resampled first. Returns the written texture region, `None` if nothing
/// was written.
pub fn update_from_buffer<B: GpuBackend + ?Sized>(
    backend: &mut B,
    texture: TextureId,
    color: &dyn ColorManagement,
    buffer: &ImageBuffer,
    rect: PixelRect,
    dest: &TilePlacement,
    store_premultiplied: bool,
) -> udim_gpu::Result<Option<UploadRegion>> {
    let full = UVec2::new(buffer.width(), buffer.height());
    let Some(rect) = rect.clamp_to_size(full.x, full.y) else {
        return Ok(None);
    };
    if dest.is_empty() {
        return Ok(None);
    }
    let scaled = dest.size != full;
    let conversion = choose_conversion(buffer, scaled, store_premultiplied);

    if scaled {
        let padded = rect.padded(SCALED_UPDATE_PADDING, full.x, full.y);
        let (x, w) = scale_span(padded.xmin, padded.width(), full.x, dest.size.x);
        let (y, h) = scale_span(padded.ymin, padded.height(), full.y, dest.size.y);
        if w <= 0 || h <= 0 {
            return Ok(None);
        }
        let texels = Texels::convert(color, buffer, padded, conversion, store_premultiplied)
            .resampled(padded.size(), UVec2::new(w as u32, h as u32));
        let region = UploadRegion::new(
            dest.offset.x + x as u32,
            dest.offset.y + y as u32,
            dest.layer,
            w as u32,
            h as u32,
        );
        backend.update_sub(texture, region, TexelUpload::packed(texels.data(), region.width))?;
        tracing::trace!(texture = texture.0, ?region, ?conversion, "scaled region uploaded");
        return Ok(Some(region));
    }

    let region = UploadRegion::new(
        dest.offset.x + rect.xmin as u32,
        dest.offset.y + rect.ymin as u32,
        dest.layer,
        rect.width() as u32,
        rect.height() as u32,
    );
    let raw = match (conversion, buffer.data()) {
        (Conversion::Raw, PixelData::Bytes(data)) => Some(TexelData::Bytes(data)),
        (Conversion::Raw, PixelData::Floats(data)) => Some(TexelData::Floats(data)),
        _ => None,
    };
    if let Some(data) = raw {
        let offset = buffer.element_offset(rect.xmin as u32, rect.ymin as u32);
        backend.update_sub(texture, region, TexelUpload::strided(data, full.x, offset))?;
    } else {
        let texels = Texels::convert(color, buffer, rect, conversion, store_premultiplied);
        backend.update_sub(texture, region, TexelUpload::packed(texels.data(), region.width))?;
    }
    tracing::trace!(texture = texture.0, ?region, ?conversion, "region uploaded");
    Ok(Some(region))
}
