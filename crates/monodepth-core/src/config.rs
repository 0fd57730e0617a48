//! Estimator configuration
//!
//! Loaded from YAML, then overridden by `MONODEPTH_*` environment variables.

use crate::onnx_utils::Device;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: String, error: std::io::Error },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Checkpoint name, e.g. `mono_640x192`
    pub model_name: String,
    /// Directory holding one sub-directory per checkpoint
    pub models_dir: PathBuf,
    pub device: Device,
    /// Nearest depth the disparity range maps to
    pub min_depth: f32,
    /// Farthest depth the disparity range maps to
    pub max_depth: f32,
    /// Base URL serving `<model_name>.zip` bundles
    pub download_base_url: Option<String>,
    /// Hex SHA-256 digest the downloaded bundle must match
    pub download_sha256: Option<String>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            model_name: "mono_640x192".to_string(),
            models_dir: PathBuf::from("models"),
            device: Device::Auto,
            min_depth: 0.1,
            max_depth: 100.0,
            download_base_url: None,
            download_sha256: None,
        }
    }
}

impl EstimatorConfig {
    /// Load configuration from a YAML file; missing keys take their defaults
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EstimatorConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MONODEPTH_MODELS_DIR`, `MONODEPTH_MODEL`, `MONODEPTH_DEVICE`,
    /// `MONODEPTH_DOWNLOAD_URL` and `MONODEPTH_DOWNLOAD_SHA256` overrides
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup("MONODEPTH_MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("MONODEPTH_MODEL") {
            self.model_name = name;
        }
        if let Some(device) = lookup("MONODEPTH_DEVICE") {
            self.device = device
                .parse()
                .map_err(|e: crate::OnnxError| ConfigError::Invalid(e.to_string()))?;
        }
        if let Some(url) = lookup("MONODEPTH_DOWNLOAD_URL") {
            self.download_base_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(digest) = lookup("MONODEPTH_DOWNLOAD_SHA256") {
            self.download_sha256 = Some(digest).filter(|d| !d.is_empty());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model_name is empty".to_string()));
        }
        if !(self.min_depth > 0.0 && self.min_depth < self.max_depth) {
            return Err(ConfigError::Invalid(format!(
                "depth range must satisfy 0 < min_depth < max_depth (got {} .. {})",
                self.min_depth, self.max_depth
            )));
        }
        if let Some(digest) = &self.download_sha256 {
            let digest = digest.trim();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "download_sha256 must be 64 hex characters (got '{digest}')"
                )));
            }
        }
        Ok(())
    }
}
