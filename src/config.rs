//! Configuration management for the placeholder image server.
//!
//! Handles loading and validating configuration from JSON files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source images shipped with the service, in catalog order.
///
/// The position of each file is its `image` index, so entries must only ever
/// be appended.
pub const DEFAULT_CATALOG: &[&str] = &[
    "leaf-footed-bug-on-a-window-2.jpg",
    "black-widow-underbelly.jpg",
    "leaf-footed-bug-on-a-window-1.jpg",
    "big-brown-moth-2.jpg",
    "cotton-candy-moth.jpg",
    "easter-bugs-3.jpg",
    "ladybug-softy.jpg",
    "easter-bugs-1.jpg",
    "easter-bugs-2.jpg",
    "ladybug-macro.jpg",
    "beetle-on-a-leaf_27937308242_o.jpg",
    "macro-fly.jpg",
    "little-green-leaf-bug.jpg",
    "bug-juice.jpg",
    "jumping-spider.jpg",
    "rolley-polley.jpg",
    "big-harry-tarantula.jpg",
    "inch-worm-macro-2.jpg",
    "inch-worm-macro-1.jpg",
    "spider-in-white.jpg",
    "unknown-red-bug.jpg",
    "under-ladybug-skirt.jpg",
    "beetles-under-tree-bark-macro-1.jpg",
    "beetles-under-tree-bark-macro-2.jpg",
    "bug-silhouette-on-screen.jpg",
    "bumble-bee.jpg",
    "potato-beetle.jpg",
    "big-fly.jpg",
];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Web server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path prefix all routes are mounted under ("" mounts at root)
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Directory holding the catalog source images
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Catalog file names, index order
    #[serde(default = "default_images")]
    pub images: Vec<String>,

    /// Largest accepted width or height
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Width and height served by the default endpoint
    #[serde(default = "default_size")]
    pub default_size: u32,

    /// JPEG output quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Lifetime of a cached render in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached renders kept after a sweep
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Number of renders allowed on the blocking pool at once
    #[serde(default = "default_max_concurrent_transforms")]
    pub max_concurrent_transforms: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/bugipsum".to_string()
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("public/images/bugs/only")
}

fn default_images() -> Vec<String> {
    DEFAULT_CATALOG.iter().map(|name| name.to_string()).collect()
}

fn default_max_dimension() -> u32 {
    5000
}

fn default_size() -> u32 {
    300
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_cache_max_entries() -> usize {
    1000
}

fn default_max_concurrent_transforms() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_path: default_base_path(),
            images_dir: default_images_dir(),
            images: default_images(),
            max_dimension: default_max_dimension(),
            default_size: default_size(),
            jpeg_quality: default_jpeg_quality(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            max_concurrent_transforms: default_max_concurrent_transforms(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one catalog image is required".to_string(),
            ));
        }

        if let Some(name) = self.images.iter().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "Catalog image name '{}' is empty",
                name
            )));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "port must be greater than 0".to_string(),
            ));
        }

        if !self.base_path.is_empty()
            && (!self.base_path.starts_with('/') || self.base_path.ends_with('/'))
        {
            return Err(ConfigError::ValidationError(format!(
                "base_path '{}' must start with '/' and must not end with '/'",
                self.base_path
            )));
        }

        if self.max_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "max_dimension must be greater than 0".to_string(),
            ));
        }

        if self.default_size == 0 || self.default_size > self.max_dimension {
            return Err(ConfigError::ValidationError(format!(
                "default_size must be between 1 and {}",
                self.max_dimension
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.max_concurrent_transforms == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_transforms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Full paths of the catalog images, index order
    pub fn catalog_paths(&self) -> Vec<PathBuf> {
        self.images
            .iter()
            .map(|name| self.images_dir.join(name))
            .collect()
    }

    /// Cache entry lifetime
    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.images.len(), 28);
        assert_eq!(config.max_dimension, 5000);
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.cache_ttl().as_secs(), 86_400);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"port": 9000, "base_path": ""}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.base_path, "");
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.images[5], "easter-bugs-3.jpg");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_catalog() {
        let config = Config {
            images: Vec::new(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rejects_bad_base_path() {
        for base_path in ["bugipsum", "/bugipsum/"] {
            let config = Config {
                base_path: base_path.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "accepted {base_path}");
        }
    }

    #[test]
    fn test_rejects_quality_out_of_range() {
        let config = Config {
            jpeg_quality: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"images_dir": "/srv/bugs", "images": ["a.jpg", "b.jpg"]}"#)
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.catalog_paths(),
            vec![PathBuf::from("/srv/bugs/a.jpg"), PathBuf::from("/srv/bugs/b.jpg")]
        );
    }
}
