//! Pretrained checkpoint registry and on-disk model store
//!
//! Each model is a directory `<root>/<name>/` holding `encoder.onnx` and
//! `depth.onnx`. Missing checkpoints can be fetched as `<base_url>/<name>.zip`
//! when a download base URL is configured. A configured SHA-256 digest is
//! checked before anything is unpacked.

use monodepth_common::ImageSize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the encoder checkpoint inside a model directory
pub const ENCODER_FILE: &str = "encoder.onnx";
/// File name of the depth decoder checkpoint inside a model directory
pub const DECODER_FILE: &str = "depth.onnx";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model name '{0}': expected a known model or a name ending in _<W>x<H>")]
    InvalidName(String),

    #[error("Model '{name}' not found: expected {encoder} and {decoder} (set a download URL to fetch it)")]
    Missing {
        name: String,
        encoder: String,
        decoder: String,
    },

    #[error("Download of {url} failed: {error}")]
    Download { url: String, error: String },

    #[error("Checksum mismatch for {url}: expected sha256 {expected}, got {actual}")]
    Checksum {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid model archive: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Training supervision of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Supervision {
    Mono,
    Stereo,
    MonoStereo,
}

impl Supervision {
    /// Stereo-trained models predict depth up to a known scale
    #[must_use]
    pub fn supports_metric_depth(self) -> bool {
        matches!(self, Supervision::Stereo | Supervision::MonoStereo)
    }

    fn from_prefix(name: &str) -> Self {
        if name.starts_with("mono+stereo") {
            Supervision::MonoStereo
        } else if name.starts_with("stereo") {
            Supervision::Stereo
        } else {
            Supervision::Mono
        }
    }
}

/// Description of a pretrained depth model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// Resolution the weights were trained with
    pub feed_size: ImageSize,
    pub supervision: Supervision,
    /// Encoder initialised from ImageNet weights before training
    pub imagenet_pretrained: bool,
}

const REGISTRY: &[(&str, u32, u32, Supervision, bool)] = &[
    ("mono_640x192", 640, 192, Supervision::Mono, true),
    ("stereo_640x192", 640, 192, Supervision::Stereo, true),
    ("mono+stereo_640x192", 640, 192, Supervision::MonoStereo, true),
    ("mono_no_pt_640x192", 640, 192, Supervision::Mono, false),
    ("stereo_no_pt_640x192", 640, 192, Supervision::Stereo, false),
    ("mono+stereo_no_pt_640x192", 640, 192, Supervision::MonoStereo, false),
    ("mono_1024x320", 1024, 320, Supervision::Mono, true),
    ("stereo_1024x320", 1024, 320, Supervision::Stereo, true),
    ("mono+stereo_1024x320", 1024, 320, Supervision::MonoStereo, true),
];

impl ModelSpec {
    /// All published checkpoints
    #[must_use]
    pub fn registry() -> Vec<ModelSpec> {
        REGISTRY
            .iter()
            .map(|&(name, width, height, supervision, imagenet_pretrained)| ModelSpec {
                name: name.to_string(),
                feed_size: ImageSize::new(width, height),
                supervision,
                imagenet_pretrained,
            })
            .collect()
    }

    /// Look up a registry entry, or derive a spec from a `<prefix>_<W>x<H>` name
    pub fn parse_name(name: &str) -> Result<ModelSpec, ModelError> {
        if let Some(spec) = Self::registry().into_iter().find(|s| s.name == name) {
            return Ok(spec);
        }

        let feed_size =
            feed_size_from_name(name).ok_or_else(|| ModelError::InvalidName(name.to_string()))?;
        Ok(ModelSpec {
            name: name.to_string(),
            feed_size,
            supervision: Supervision::from_prefix(name),
            imagenet_pretrained: !name.contains("_no_pt"),
        })
    }
}

/// Parse the trailing `_<W>x<H>` of a model name
#[must_use]
pub fn feed_size_from_name(name: &str) -> Option<ImageSize> {
    let suffix = name.rsplit('_').next()?;
    let (w, h) = suffix.split_once('x')?;
    let width = w.parse::<u32>().ok().filter(|&v| v > 0)?;
    let height = h.parse::<u32>().ok().filter(|&v| v > 0)?;
    Some(ImageSize::new(width, height))
}

/// Paths of an installed checkpoint pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub encoder: PathBuf,
    pub decoder: PathBuf,
}

impl ModelFiles {
    fn in_dir(dir: PathBuf) -> Self {
        Self {
            encoder: dir.join(ENCODER_FILE),
            decoder: dir.join(DECODER_FILE),
            dir,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.encoder.is_file() && self.decoder.is_file()
    }
}

/// Installation status of a registry entry
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub spec: ModelSpec,
    pub installed: bool,
}

/// Directory of model checkpoints with optional download on miss
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    download_base_url: Option<String>,
    expected_sha256: Option<String>,
}

impl ModelStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            download_base_url: None,
            expected_sha256: None,
        }
    }

    #[must_use]
    pub fn with_download_base_url(mut self, url: Option<String>) -> Self {
        self.download_base_url = url.map(|u| u.trim_end_matches('/').to_string());
        self
    }

    /// Hex SHA-256 digest the downloaded archive must match
    #[must_use]
    pub fn with_expected_sha256(mut self, digest: Option<String>) -> Self {
        self.expected_sha256 = digest.map(|d| d.trim().to_ascii_lowercase());
        self
    }

    /// Expected checkpoint paths for `name`, whether or not they exist
    #[must_use]
    pub fn files(&self, name: &str) -> ModelFiles {
        ModelFiles::in_dir(self.root.join(name))
    }

    /// Return the checkpoint pair for `name`, downloading it first if needed
    pub fn ensure(&self, name: &str) -> Result<ModelFiles, ModelError> {
        ModelSpec::parse_name(name)?;
        let files = self.files(name);
        if files.is_complete() {
            debug!("Model {} found in {}", name, files.dir.display());
            return Ok(files);
        }

        let Some(base) = &self.download_base_url else {
            return Err(missing(name, &files));
        };

        let url = format!("{base}/{name}.zip");
        info!("-> Downloading pretrained model {} from {}", name, url);
        let bytes = download(&url)?;

        if let Some(expected) = &self.expected_sha256 {
            let actual = sha256_hex(&bytes);
            if &actual != expected {
                return Err(ModelError::Checksum {
                    url,
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified for {}", url);
        }

        let created = !files.dir.exists();
        info!("   Unzipping model to {}", files.dir.display());
        let extracted = extract_archive(&bytes, &files.dir);

        if extracted.is_ok() && files.is_complete() {
            info!("   Model unzipped to {}", files.dir.display());
            return Ok(files);
        }

        // Leave no half-installed model behind
        if created {
            if let Err(e) = fs::remove_dir_all(&files.dir) {
                warn!("Failed to clean up {}: {}", files.dir.display(), e);
            }
        }
        extracted?;
        Err(missing(name, &files))
    }

    /// Installation status of every registry entry
    #[must_use]
    pub fn status(&self) -> Vec<ModelStatus> {
        ModelSpec::registry()
            .into_iter()
            .map(|spec| ModelStatus {
                installed: self.files(&spec.name).is_complete(),
                spec,
            })
            .collect()
    }
}

fn missing(name: &str, files: &ModelFiles) -> ModelError {
    ModelError::Missing {
        name: name.to_string(),
        encoder: files.encoder.display().to_string(),
        decoder: files.decoder.display().to_string(),
    }
}

fn download(url: &str) -> Result<Vec<u8>, ModelError> {
    let err = |error: String| ModelError::Download {
        url: url.to_string(),
        error,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| err(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| err(e.to_string()))?;

    let bytes = response.bytes().map_err(|e| err(e.to_string()))?;
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Lowercase hex SHA-256 digest of `bytes`
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Unpack the files of a checkpoint bundle into `target`.
///
/// Directory structure inside the archive is flattened: every file lands
/// directly in `target` under its file name.
pub fn extract_archive(bytes: &[u8], target: &Path) -> Result<(), ModelError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ModelError::Archive(e.to_string()))?;

    fs::create_dir_all(target)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ModelError::Archive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        else {
            return Err(ModelError::Archive(format!(
                "unsafe entry name '{}'",
                entry.name()
            )));
        };

        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        fs::write(target.join(&file_name), contents)?;
        debug!("Extracted {}", Path::new(&file_name).display());
    }

    Ok(())
}
