//! `monodepth predict` - disparity for a single image or a folder of images

use anyhow::{bail, Context, Result};
use clap::Args;
use monodepth_core::image_io::{find_images, load_image};
use monodepth_core::models::ModelSpec;
use monodepth_core::onnx_utils::Device;
use monodepth_core::EstimatorConfig;
use monodepth_estimation::{save_outputs, DepthError, DepthEstimator, OutputOptions, SavedOutputs};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Args, Debug)]
pub struct PredictCommand {
    /// Image file, or directory of images
    pub image_path: PathBuf,

    /// Image extension to search for when IMAGE_PATH is a directory
    #[arg(long, default_value = "jpg")]
    pub ext: String,

    /// Pretrained model to use (e.g. mono_640x192)
    #[arg(long)]
    pub model_name: Option<String>,

    /// Directory holding the model checkpoints
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Where to write predictions (defaults to the image's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Compute device: auto, cuda, coreml or cpu
    #[arg(long)]
    pub device: Option<Device>,

    /// Force CPU even when CUDA is available
    #[arg(long)]
    pub no_cuda: bool,

    /// Save metric depth instead of disparity (stereo-trained models only)
    #[arg(long)]
    pub pred_metric_depth: bool,

    /// Print a JSON summary of the written files to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct PredictionSummary {
    image: PathBuf,
    width: u32,
    height: u32,
    min_disparity: f32,
    max_disparity: f32,
    mean_disparity: f32,
    #[serde(flatten)]
    outputs: SavedOutputs,
}

impl PredictCommand {
    /// Configuration from the file (or defaults), environment, then flags
    fn build_config(&self) -> Result<EstimatorConfig> {
        let mut config = match &self.config {
            Some(path) => EstimatorConfig::from_yaml(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EstimatorConfig::default(),
        }
        .apply_env()
        .context("Invalid environment override")?;

        if let Some(name) = &self.model_name {
            config.model_name = name.clone();
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if self.no_cuda {
            config.device = Device::Cpu;
        }

        config.validate()?;
        Ok(config)
    }

    /// Input images and the default output directory
    fn resolve_inputs(&self) -> Result<(Vec<PathBuf>, PathBuf)> {
        let path = &self.image_path;
        if path.is_file() {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            Ok((vec![path.clone()], dir))
        } else if path.is_dir() {
            let paths = find_images(path, &self.ext)
                .with_context(|| format!("Failed to list {}", path.display()))?;
            Ok((paths, path.clone()))
        } else {
            bail!("Can not find image_path: {}", path.display())
        }
    }

    pub fn execute(self) -> Result<()> {
        let start = Instant::now();
        let config = self.build_config()?;

        let spec = ModelSpec::parse_name(&config.model_name)?;
        if self.pred_metric_depth && !spec.supervision.supports_metric_depth() {
            return Err(DepthError::MetricDepthUnsupported(spec.name).into());
        }

        let (paths, default_dir) = self.resolve_inputs()?;
        let output_dir = self.output_dir.clone().unwrap_or(default_dir);

        let mut estimator = DepthEstimator::from_config(&config)
            .with_context(|| format!("Failed to load model {}", config.model_name))?;

        let options = OutputOptions {
            min_depth: config.min_depth,
            max_depth: config.max_depth,
            metric_depth: self.pred_metric_depth,
            ..OutputOptions::default()
        };

        info!("-> Predicting on {} test images", paths.len());

        let mut summaries = Vec::with_capacity(paths.len());
        for (idx, path) in paths.iter().enumerate() {
            let image =
                load_image(path).with_context(|| format!("Failed to load {}", path.display()))?;
            let disparity = estimator
                .predict(&image)
                .with_context(|| format!("Depth prediction failed on {}", path.display()))?;

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image_{idx}"));
            let outputs = save_outputs(&output_dir, &stem, &disparity, &options)?;

            info!(
                "   Processed {} of {} images - saved predictions to:",
                idx + 1,
                paths.len()
            );
            info!("   - {}", outputs.colormap.display());
            info!("   - {}", outputs.npy.display());

            summaries.push(PredictionSummary {
                image: path.clone(),
                width: disparity.width(),
                height: disparity.height(),
                min_disparity: disparity.min(),
                max_disparity: disparity.max(),
                mean_disparity: disparity.mean(),
                outputs,
            });
        }

        info!("-> Done! ({:.2}s)", start.elapsed().as_secs_f64());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Ok(())
    }
}
