//! Colorspace tags and transfer functions.

use serde::{Deserialize, Serialize};

/// Colorspace of a pixel buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    /// sRGB transfer, the default for 8-bit images.
    #[default]
    Srgb,
    /// Linear scene-referred values.
    SceneLinear,
    /// Non-color data (normal maps, masks); never transformed.
    NonColor,
    /// Pure 2.2 gamma.
    Gamma22,
    /// BT.1886 display (2.4 gamma).
    Rec1886,
}

impl ColorSpace {
    /// True for non-color data.
    #[inline]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::NonColor)
    }

    #[inline]
    pub const fn is_scene_linear(self) -> bool {
        matches!(self, Self::SceneLinear)
    }

    #[inline]
    pub const fn is_srgb(self) -> bool {
        matches!(self, Self::Srgb)
    }

    /// Decode an encoded channel value to scene linear.
    #[inline]
    pub fn to_linear(self, value: f32) -> f32 {
        match self {
            Self::Srgb => srgb_to_linear(value),
            Self::SceneLinear | Self::NonColor => value,
            Self::Gamma22 => value.max(0.0).powf(2.2),
            Self::Rec1886 => value.max(0.0).powf(2.4),
        }
    }
}

/// sRGB electro-optical transfer function.
#[inline]
pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.040_45 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

/// Inverse of [`srgb_to_linear`].
#[inline]
pub fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value.max(0.0) * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn srgb_roundtrip() {
        for i in 0..=255u8 {
            let v = f32::from(i) / 255.0;
            assert_relative_eq!(linear_to_srgb(srgb_to_linear(v)), v, epsilon = 1e-5);
        }
    }

    #[test]
    fn data_is_untouched() {
        assert_relative_eq!(ColorSpace::NonColor.to_linear(0.5), 0.5);
        assert_relative_eq!(ColorSpace::SceneLinear.to_linear(0.25), 0.25);
        assert!(ColorSpace::NonColor.is_data());
        assert!(!ColorSpace::Srgb.is_data());
    }

    #[test]
    fn gamma_spaces_decode() {
        assert_relative_eq!(ColorSpace::Gamma22.to_linear(0.5), 0.5f32.powf(2.2));
        assert_relative_eq!(ColorSpace::Rec1886.to_linear(1.0), 1.0);
    }
}
