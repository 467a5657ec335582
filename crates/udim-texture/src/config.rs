//! Texture cache configuration.

use serde::{Deserialize, Serialize};

/// Garbage collection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Seconds an image may stay unused before its GPU data is freed (0 disables collection).
    pub timeout_secs: u64,
    /// Minimum seconds between two sweeps.
    pub collect_interval_secs: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            collect_interval_secs: 60,
        }
    }
}

impl GcConfig {
    /// Check if collection is enabled.
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.timeout_secs != 0
    }
}

/// Texture cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureCacheConfig {
    /// Per-axis resolution limit in pixels (0 = backend maximum).
    pub resolution_limit: u32,
    /// Generate mip chains for uploaded textures.
    pub mipmap: bool,
    /// Garbage collection.
    pub gc: GcConfig,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            resolution_limit: 0,
            mipmap: true,
            gc: GcConfig::default(),
        }
    }
}

impl TextureCacheConfig {
    /// Set the per-axis resolution limit.
    #[must_use]
    pub const fn with_resolution_limit(mut self, limit: u32) -> Self {
        self.resolution_limit = limit;
        self
    }

    /// Enable or disable mipmaps.
    #[must_use]
    pub const fn with_mipmap(mut self, mipmap: bool) -> Self {
        self.mipmap = mipmap;
        self
    }

    /// Set the garbage collection timeout (0 disables collection).
    #[must_use]
    pub const fn with_gc_timeout(mut self, secs: u64) -> Self {
        self.gc.timeout_secs = secs;
        self
    }

    /// Set the minimum interval between garbage collection sweeps.
    #[must_use]
    pub const fn with_gc_interval(mut self, secs: u64) -> Self {
        self.gc.collect_interval_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TextureCacheConfig::default();
        assert_eq!(config.resolution_limit, 0);
        assert!(config.mipmap);
        assert_eq!(config.gc.timeout_secs, 120);
        assert_eq!(config.gc.collect_interval_secs, 60);
        assert!(config.gc.is_enabled());
    }

    #[test]
    fn builders() {
        let config = TextureCacheConfig::default()
            .with_resolution_limit(2048)
            .with_mipmap(false)
            .with_gc_timeout(0)
            .with_gc_interval(5);
        assert_eq!(config.resolution_limit, 2048);
        assert!(!config.mipmap);
        assert!(!config.gc.is_enabled());
        assert_eq!(config.gc.collect_interval_secs, 5);
    }
}
