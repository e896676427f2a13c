//! Configuration for the climate session and its data sources
//!
//! Presets follow the same shape as the tile-loading presets: a balanced
//! default, a low-resource variant, and a deterministic one for tests.

use crate::core::constants::{
    DEFAULT_BASE_LAYER_PATH, DEFAULT_MANIFEST_PATH, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_TILE_DIR, FINE_ZOOM_THRESHOLD,
};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Zoom at or above which the fine layer is shown
    pub fine_zoom_threshold: f64,
    /// Maximum tile fetches in flight during one viewport batch
    pub max_concurrent_fetches: usize,
    /// Location of the tile manifest, relative to the source root
    pub manifest_path: String,
    /// Location of the coarse base layer, relative to the source root
    pub base_layer_path: String,
    /// Directory holding the fine tile files named in the manifest
    pub tile_dir: String,
    /// Start the manifest fetch during `initialize` instead of on first zoom-in
    pub prefetch_manifest: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fine_zoom_threshold: FINE_ZOOM_THRESHOLD,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            base_layer_path: DEFAULT_BASE_LAYER_PATH.to_string(),
            tile_dir: DEFAULT_TILE_DIR.to_string(),
            prefetch_manifest: true,
        }
    }
}

impl SessionConfig {
    pub fn low_resource() -> Self {
        Self {
            max_concurrent_fetches: 4,
            prefetch_manifest: false,
            ..Self::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            max_concurrent_fetches: 4,
            manifest_path: "manifest.json".to_string(),
            base_layer_path: "base.json".to_string(),
            tile_dir: "tiles".to_string(),
            prefetch_manifest: false,
            ..Self::default()
        }
    }

    pub fn with_fine_zoom_threshold(mut self, zoom: f64) -> Self {
        self.fine_zoom_threshold = zoom;
        self
    }

    /// Source-relative path of a tile file from the manifest
    pub fn tile_path(&self, file: &str) -> String {
        if self.tile_dir.is_empty() {
            file.to_string()
        } else {
            format!("{}/{}", self.tile_dir.trim_end_matches('/'), file)
        }
    }

    /// Concurrency actually used; zero would stall a batch forever
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpSourceConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("koppen/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = SessionConfig::default();
        let low = SessionConfig::low_resource();
        assert_eq!(default.fine_zoom_threshold, FINE_ZOOM_THRESHOLD);
        assert!(low.max_concurrent_fetches < default.max_concurrent_fetches);
        assert!(!SessionConfig::for_testing().prefetch_manifest);
    }

    #[test]
    fn test_tile_path() {
        let config = SessionConfig::default();
        assert_eq!(config.tile_path("t_0_0.json"), "tiles/t_0_0.json");

        let config = SessionConfig {
            tile_dir: "data/tiles/".to_string(),
            ..SessionConfig::default()
        };
        assert_eq!(config.tile_path("a.json"), "data/tiles/a.json");

        let config = SessionConfig {
            tile_dir: String::new(),
            ..SessionConfig::default()
        };
        assert_eq!(config.tile_path("a.json"), "a.json");
    }

    #[test]
    fn test_effective_concurrency_never_zero() {
        let config = SessionConfig {
            max_concurrent_fetches: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.effective_concurrency(), 1);
    }
}
