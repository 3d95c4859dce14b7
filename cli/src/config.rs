//! Settings file handling
//!
//! Lookup order: the `--config` path if given, then
//! `<config_dir>/geolens/config.toml`, then built-in defaults.
//! Command-line flags are applied on top by the caller.

use anyhow::{Context, Result};
use geo_cluster::ClusterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub clustering: ClusterConfig,
    pub cache: CacheSettings,
    pub inference: InferenceSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Database location; defaults to ~/.geolens/cache/predictions.db
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Base URL of the GeoCLIP inference service
    pub service_url: String,
    /// Predictions requested per image
    pub top_k: u32,
    /// Device hint forwarded to the service ("auto", "cpu", "cuda", "rocm")
    pub device: String,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8000".to_string(),
            top_k: 5,
            device: "auto".to_string(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("no settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("geolens").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.clustering.radius_km, 100.0);
        assert_eq!(settings.clustering.minimum_cluster_size, 2);
        assert_eq!(settings.clustering.max_boost_fraction, 0.15);
        assert_eq!(settings.inference.top_k, 5);
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml_str(
            r#"
            [clustering]
            radius_km = 50.0

            [cache]
            path = "/tmp/geolens.db"
            "#,
        )
        .unwrap();

        assert_eq!(settings.clustering.radius_km, 50.0);
        assert_eq!(settings.clustering.minimum_cluster_size, 2);
        assert_eq!(settings.cache.path, Some(PathBuf::from("/tmp/geolens.db")));
        assert_eq!(settings.inference, InferenceSettings::default());
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[clustering]\nminimum_cluster_size = 3\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.clustering.minimum_cluster_size, 3);
    }

    #[test]
    fn test_malformed_file_errors() {
        assert!(Settings::from_toml_str("[clustering\nradius_km = ").is_err());
    }
}
