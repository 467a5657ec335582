//! CPU reference backend.
//!
//! Stores every texture as RGBA `f32` texels in host memory and records the
//! commands it receives, so uploads can be inspected by tools and tests.

use crate::backend::GpuBackend;
use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::texture::{
    ExtendMode, TexelUpload, TextureDesc, TextureDimension, TextureFormat, TextureId,
    UploadRegion,
};
use glam::UVec2;
use hashbrown::HashMap;

/// Color of placeholder textures.
const ERROR_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

/// A command received by the software backend.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    Create {
        texture: TextureId,
        desc: TextureDesc,
    },
    CreateError {
        texture: TextureId,
        dimension: TextureDimension,
    },
    UpdateSub {
        texture: TextureId,
        region: UploadRegion,
        row_length: u32,
        float_data: bool,
    },
    GenerateMipmaps {
        texture: TextureId,
    },
    SetMipmapMode {
        texture: TextureId,
        mipmap: bool,
        linear: bool,
    },
    SetExtendMode {
        texture: TextureId,
        mode: ExtendMode,
    },
    Free {
        texture: TextureId,
    },
}

struct SoftwareTexture {
    desc: TextureDesc,
    texels: Vec<[f32; 4]>,
    placeholder: bool,
    mipmap: bool,
    linear: bool,
    extend: ExtendMode,
    mip_generations: u32,
}

impl SoftwareTexture {
    fn index(&self, x: u32, y: u32, layer: u32) -> usize {
        let w = self.desc.width as usize;
        let h = self.desc.height as usize;
        layer as usize * w * h + y as usize * w + x as usize
    }
}

/// Host-memory implementation of [`GpuBackend`].
pub struct SoftwareBackend {
    capabilities: GpuCapabilities,
    textures: HashMap<TextureId, SoftwareTexture>,
    next_id: u64,
    commands: Vec<GpuCommand>,
}

impl SoftwareBackend {
    /// Create a backend with the given limits.
    pub fn new(capabilities: GpuCapabilities) -> Self {
        Self {
            capabilities,
            textures: HashMap::new(),
            next_id: 1,
            commands: Vec::new(),
        }
    }

    /// Create a backend with a specific maximum texture size.
    pub fn with_max_texture_size(max_texture_size: u32) -> Self {
        Self::new(GpuCapabilities {
            device_name: "software".to_string(),
            max_texture_size,
            ..GpuCapabilities::default()
        })
    }

    /// Commands received since creation or the last [`Self::take_commands`].
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Check if a texture is alive.
    pub fn contains(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    /// Descriptor of a live texture.
    pub fn desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    /// Check if a texture is a placeholder.
    pub fn is_error_texture(&self, texture: TextureId) -> bool {
        self.textures.get(&texture).is_some_and(|t| t.placeholder)
    }

    /// Read one texel of level 0.
    pub fn texel(&self, texture: TextureId, x: u32, y: u32, layer: u32) -> Option<[f32; 4]> {
        let tex = self.textures.get(&texture)?;
        if x >= tex.desc.width || y >= tex.desc.height || layer >= tex.desc.layers {
            return None;
        }
        Some(tex.texels[tex.index(x, y, layer)])
    }

    /// Mipmap sampling state `(mipmap, linear)`.
    pub fn mipmap_mode(&self, texture: TextureId) -> Option<(bool, bool)> {
        self.textures.get(&texture).map(|t| (t.mipmap, t.linear))
    }

    /// Number of times the mip chain was regenerated.
    pub fn mip_generations(&self, texture: TextureId) -> u32 {
        self.textures.get(&texture).map_or(0, |t| t.mip_generations)
    }

    /// Sampler wrap mode.
    pub fn extend_mode(&self, texture: TextureId) -> Option<ExtendMode> {
        self.textures.get(&texture).map(|t| t.extend)
    }

    fn allocate_id(&mut self) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        id
    }

    fn texture_mut(&mut self, texture: TextureId) -> Result<&mut SoftwareTexture> {
        self.textures
            .get_mut(&texture)
            .ok_or(GpuError::UnknownTexture(texture))
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new(GpuCapabilities {
            device_name: "software".to_string(),
            ..GpuCapabilities::default()
        })
    }
}

impl GpuBackend for SoftwareBackend {
    fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial: Option<TexelUpload<'_>>,
    ) -> Result<TextureId> {
        let max = self.capabilities.max_texture_size;
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
            return Err(GpuError::TextureCreation(format!(
                "{}: zero-sized texture {}x{}x{}",
                desc.label, desc.width, desc.height, desc.layers
            )));
        }
        if desc.width > max || desc.height > max {
            return Err(GpuError::TextureCreation(format!(
                "{}: {}x{} exceeds maximum size {max}",
                desc.label, desc.width, desc.height
            )));
        }
        if desc.layers > self.capabilities.max_array_layers {
            return Err(GpuError::TextureCreation(format!(
                "{}: {} layers exceeds maximum {}",
                desc.label, desc.layers, self.capabilities.max_array_layers
            )));
        }

        let id = self.allocate_id();
        self.textures.insert(
            id,
            SoftwareTexture {
                desc: desc.clone(),
                texels: vec![[0.0; 4]; desc.texel_count()],
                placeholder: false,
                mipmap: false,
                linear: true,
                extend: ExtendMode::default(),
                mip_generations: 0,
            },
        );
        self.commands.push(GpuCommand::Create {
            texture: id,
            desc: desc.clone(),
        });

        if let Some(upload) = initial {
            // Each layer is uploaded as a separate region of one packed buffer.
            let layer_elements = 4 * desc.width as usize * desc.height as usize;
            for layer in 0..desc.layers {
                let layer_upload = TexelUpload::strided(
                    upload.data,
                    upload.row_length,
                    upload.offset + layer as usize * layer_elements,
                );
                let region = UploadRegion::new(0, 0, layer, desc.width, desc.height);
                if let Err(err) = self.update_sub(id, region, layer_upload) {
                    self.textures.remove(&id);
                    return Err(err);
                }
            }
        }

        tracing::trace!(texture = id.0, label = %desc.label, "software texture created");
        Ok(id)
    }

    fn create_error_texture(&mut self, dimension: TextureDimension) -> Result<TextureId> {
        let id = self.allocate_id();
        let desc = TextureDesc {
            label: "error".to_string(),
            dimension,
            format: TextureFormat::Rgba8,
            width: 1,
            height: 1,
            layers: 1,
        };
        self.textures.insert(
            id,
            SoftwareTexture {
                desc,
                texels: vec![ERROR_COLOR],
                placeholder: true,
                mipmap: false,
                linear: false,
                extend: ExtendMode::default(),
                mip_generations: 0,
            },
        );
        self.commands.push(GpuCommand::CreateError {
            texture: id,
            dimension,
        });
        Ok(id)
    }

    fn update_sub(
        &mut self,
        texture: TextureId,
        region: UploadRegion,
        upload: TexelUpload<'_>,
    ) -> Result<()> {
        let tex = self.texture_mut(texture)?;
        if region.x + region.width > tex.desc.width
            || region.y + region.height > tex.desc.height
            || region.layer >= tex.desc.layers
        {
            return Err(GpuError::OutOfBounds(format!(
                "region {region:?} outside {}x{}x{}",
                tex.desc.width, tex.desc.height, tex.desc.layers
            )));
        }
        upload.validate(region.width, region.height)?;

        for y in 0..region.height {
            for x in 0..region.width {
                let dst = tex.index(region.x + x, region.y + y, region.layer);
                tex.texels[dst] = upload.data.texel(upload.element_offset(x, y));
            }
        }

        self.commands.push(GpuCommand::UpdateSub {
            texture,
            region,
            row_length: upload.row_length,
            float_data: matches!(upload.data, crate::texture::TexelData::Floats(_)),
        });
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()> {
        self.texture_mut(texture)?.mip_generations += 1;
        self.commands.push(GpuCommand::GenerateMipmaps { texture });
        Ok(())
    }

    fn set_mipmap_mode(&mut self, texture: TextureId, mipmap: bool, linear: bool) -> Result<()> {
        let tex = self.texture_mut(texture)?;
        tex.mipmap = mipmap;
        tex.linear = linear;
        self.commands.push(GpuCommand::SetMipmapMode {
            texture,
            mipmap,
            linear,
        });
        Ok(())
    }

    fn set_extend_mode(&mut self, texture: TextureId, mode: ExtendMode) -> Result<()> {
        self.texture_mut(texture)?.extend = mode;
        self.commands
            .push(GpuCommand::SetExtendMode { texture, mode });
        Ok(())
    }

    fn free_texture(&mut self, texture: TextureId) -> Result<()> {
        self.textures
            .remove(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        self.commands.push(GpuCommand::Free { texture });
        Ok(())
    }

    fn texture_size(&self, texture: TextureId) -> Result<UVec2> {
        self.textures
            .get(&texture)
            .map(|t| UVec2::new(t.desc.width, t.desc.height))
            .ok_or(GpuError::UnknownTexture(texture))
    }

    fn read_back(&self, texture: TextureId) -> Result<Vec<f32>> {
        let tex = self
            .textures
            .get(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        Ok(tex.texels.iter().flatten().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TexelData;

    #[test]
    fn create_and_update_region() {
        let mut backend = SoftwareBackend::default();
        let desc = TextureDesc::d2_array("test", TextureFormat::Rgba8, 4, 4, 2);
        let tex = backend.create_texture(&desc, None).unwrap();

        let pixels = [255u8; 4 * 2 * 2];
        backend
            .update_sub(
                tex,
                UploadRegion::new(1, 2, 1, 2, 2),
                TexelUpload::packed(TexelData::Bytes(&pixels), 2),
            )
            .unwrap();

        assert_eq!(backend.texel(tex, 1, 2, 1), Some([1.0; 4]));
        assert_eq!(backend.texel(tex, 2, 3, 1), Some([1.0; 4]));
        assert_eq!(backend.texel(tex, 1, 2, 0), Some([0.0; 4]));
        assert_eq!(backend.texel(tex, 0, 2, 1), Some([0.0; 4]));
    }

    #[test]
    fn update_outside_bounds_fails() {
        let mut backend = SoftwareBackend::default();
        let desc = TextureDesc::d2("test", TextureFormat::Rgba32F, 4, 4);
        let tex = backend.create_texture(&desc, None).unwrap();
        let pixels = [0.0f32; 4 * 4 * 4];
        let result = backend.update_sub(
            tex,
            UploadRegion::new(2, 0, 0, 4, 4),
            TexelUpload::packed(TexelData::Floats(&pixels), 4),
        );
        assert!(matches!(result, Err(GpuError::OutOfBounds(_))));
    }

    #[test]
    fn initial_data_fills_all_layers() {
        let mut backend = SoftwareBackend::default();
        let desc = TextureDesc::d1_array("mapping", TextureFormat::Rgba32F, 3, 2);
        let data: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let tex = backend
            .create_texture(&desc, Some(TexelUpload::packed(TexelData::Floats(&data), 3)))
            .unwrap();
        assert_eq!(backend.texel(tex, 2, 0, 0), Some([8.0, 9.0, 10.0, 11.0]));
        assert_eq!(backend.texel(tex, 0, 0, 1), Some([12.0, 13.0, 14.0, 15.0]));
        assert_eq!(backend.read_back(tex).unwrap(), data);
    }

    #[test]
    fn oversized_texture_is_rejected() {
        let mut backend = SoftwareBackend::with_max_texture_size(256);
        let desc = TextureDesc::d2("big", TextureFormat::Rgba8, 512, 16);
        assert!(backend.create_texture(&desc, None).is_err());
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn free_removes_texture() {
        let mut backend = SoftwareBackend::default();
        let tex = backend
            .create_error_texture(TextureDimension::D2Array)
            .unwrap();
        assert!(backend.is_error_texture(tex));
        backend.free_texture(tex).unwrap();
        assert!(!backend.contains(tex));
        assert!(backend.free_texture(tex).is_err());
    }
}
