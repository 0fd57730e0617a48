//! ONNX Runtime utilities for device selection and model loading
//!
//! Sessions are created with full graph optimizations, physical-core
//! intra-op parallelism and the execution provider matching the requested
//! [`Device`].

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Error type for ONNX operations
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("Failed to create session builder: {0}")]
    SessionBuilderError(String),

    #[error("Failed to load ONNX model from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Unknown device '{0}' (expected auto, cuda, coreml or cpu)")]
    UnknownDevice(String),
}

/// Compute device the networks run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when the provider is available, CPU otherwise
    #[default]
    Auto,
    Cuda,
    #[serde(rename = "coreml")]
    CoreMl,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Auto => "auto",
            Device::Cuda => "cuda",
            Device::CoreMl => "coreml",
            Device::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

impl FromStr for Device {
    type Err = OnnxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "coreml" => Ok(Device::CoreMl),
            "cpu" => Ok(Device::Cpu),
            other => Err(OnnxError::UnknownDevice(other.to_string())),
        }
    }
}

/// Resolve [`Device::Auto`] to a concrete device.
///
/// Explicit devices are returned unchanged.
#[must_use]
pub fn resolve_device(device: Device) -> Device {
    match device {
        Device::Auto => {
            if cuda_available() {
                Device::Cuda
            } else {
                Device::Cpu
            }
        }
        other => other,
    }
}

fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            debug!("CUDA availability check failed: {}", e);
            false
        }
    }
}

/// Get the cache directory for compiled CoreML models
///
/// Priority: `MONODEPTH_COREML_CACHE_DIR`, then `$HOME/.cache/monodepth/coreml`,
/// then the system temp directory.
fn get_coreml_cache_dir() -> PathBuf {
    let dir = if let Ok(dir) = std::env::var("MONODEPTH_COREML_CACHE_DIR") {
        PathBuf::from(dir)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache/monodepth/coreml")
    } else {
        std::env::temp_dir().join("monodepth-coreml")
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("Failed to create cache directory {}: {}", dir.display(), e);
    }
    dir
}

/// Number of intra-op threads, `MONODEPTH_THREADS` overrides the physical core count
fn intra_threads() -> usize {
    std::env::var("MONODEPTH_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(num_cpus::get_physical)
}

fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cuda => vec![CUDAExecutionProvider::default().build().error_on_failure()],
        Device::CoreMl => vec![
            CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .with_model_cache_dir(get_coreml_cache_dir().display().to_string())
                .build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::Cpu | Device::Auto => vec![CPUExecutionProvider::default().build()],
    }
}

/// Create an ONNX Runtime session for `model_path` on `device`
///
/// [`Device::Auto`] is resolved first. An explicit [`Device::Cuda`] fails if
/// the CUDA provider cannot be registered instead of silently running on CPU.
///
/// # Example
/// ```no_run
/// use monodepth_core::onnx_utils::{create_session, Device};
/// use std::path::Path;
///
/// let session = create_session(Path::new("models/mono_640x192/encoder.onnx"), Device::Auto)?;
/// # Ok::<(), monodepth_core::onnx_utils::OnnxError>(())
/// ```
pub fn create_session(model_path: &Path, device: Device) -> Result<Session, OnnxError> {
    if !model_path.exists() {
        return Err(OnnxError::ModelNotFound(model_path.display().to_string()));
    }

    let device = resolve_device(device);
    let num_threads = intra_threads();
    let start = Instant::now();

    let session = Session::builder()
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_intra_threads(num_threads)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_memory_pattern(true)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_execution_providers(execution_providers(device))
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| OnnxError::ModelLoadError {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?;

    info!(
        "Session ready for {} on {} ({} threads)",
        model_path.display(),
        device,
        num_threads
    );
    debug!("Session created in {:.3}s", start.elapsed().as_secs_f64());

    Ok(session)
}
