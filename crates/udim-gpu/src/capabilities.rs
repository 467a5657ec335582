//! GPU capability reporting.

/// Limits reported by a GPU backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuCapabilities {
    /// Device name
    pub device_name: String,
    /// Maximum width/height of a 2D texture
    pub max_texture_size: u32,
    /// Maximum layer count of an array texture
    pub max_array_layers: u32,
}

impl GpuCapabilities {
    /// Effective per-axis resolution limit.
    ///
    /// A user limit of 0 means "no user limit".
    pub fn size_limit(&self, user_limit: u32) -> u32 {
        if user_limit == 0 {
            self.max_texture_size
        } else {
            self.max_texture_size.min(user_limit)
        }
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} - max texture {}px - max layers {}",
            self.device_name, self.max_texture_size, self.max_array_layers
        )
    }
}

impl Default for GpuCapabilities {
    fn default() -> Self {
        Self {
            device_name: "unknown".to_string(),
            max_texture_size: 16384,
            max_array_layers: 2048,
        }
    }
}
