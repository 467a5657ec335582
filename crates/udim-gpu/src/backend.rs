//! The GPU resource provider interface.

use crate::capabilities::GpuCapabilities;
use crate::error::Result;
use crate::texture::{
    ExtendMode, TexelUpload, TextureDesc, TextureDimension, TextureId, UploadRegion,
};
use glam::UVec2;

/// GPU operations used by the texture cache.
///
/// All methods must be called from the thread owning the GPU context.
pub trait GpuBackend {
    /// Limits of the device.
    fn capabilities(&self) -> &GpuCapabilities;

    /// Create a texture, optionally filled with `initial` data.
    ///
    /// Textures created without data are zero-initialized.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial: Option<TexelUpload<'_>>,
    ) -> Result<TextureId>;

    /// Create a small bindable placeholder texture of the given dimensionality.
    fn create_error_texture(&mut self, dimension: TextureDimension) -> Result<TextureId>;

    /// Overwrite a sub-region of one layer.
    fn update_sub(
        &mut self,
        texture: TextureId,
        region: UploadRegion,
        upload: TexelUpload<'_>,
    ) -> Result<()>;

    /// Regenerate the mip chain from level 0.
    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()>;

    /// Enable or disable mipmapped sampling and linear filtering.
    fn set_mipmap_mode(&mut self, texture: TextureId, mipmap: bool, linear: bool) -> Result<()>;

    /// Set the sampler wrap mode.
    fn set_extend_mode(&mut self, texture: TextureId, mode: ExtendMode) -> Result<()>;

    /// Release a texture.
    fn free_texture(&mut self, texture: TextureId) -> Result<()>;

    /// Width and height of level 0.
    fn texture_size(&self, texture: TextureId) -> Result<UVec2>;

    /// Read back every texel of level 0 as RGBA floats, layer by layer.
    fn read_back(&self, texture: TextureId) -> Result<Vec<f32>>;
}
