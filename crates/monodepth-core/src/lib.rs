//! Monodepth Core - runtime plumbing shared by the depth estimator and CLI
//!
//! Device selection and ONNX session creation, image I/O, checkpoint
//! resolution and configuration.

pub mod config;
pub mod image_io;
pub mod models;
pub mod onnx_utils;

pub use config::{ConfigError, EstimatorConfig};
pub use image_io::ImageError;
pub use models::{ModelError, ModelFiles, ModelSpec, ModelStatus, ModelStore, Supervision};
pub use onnx_utils::{create_session, resolve_device, Device, OnnxError};
