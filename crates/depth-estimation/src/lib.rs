//! Monocular depth estimation with a pretrained encoder/decoder pair
//!
//! The pipeline is linear: select a device, resolve and load the encoder and
//! depth decoder checkpoints, resize the image to the resolution the weights
//! were trained with, run both networks and resample the full-resolution
//! disparity back to the input size.
//!
//! # Example
//! ```no_run
//! use monodepth_core::EstimatorConfig;
//! use monodepth_estimation::DepthEstimator;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut estimator = DepthEstimator::from_config(&EstimatorConfig::default())?;
//!
//! let img = image::open("frame.jpg")?.to_rgb8();
//! let disparity = estimator.predict(&img)?;
//!
//! println!("Disparity map size: {}", disparity.size());
//! # Ok(())
//! # }
//! ```

pub mod colormap;
pub mod network;
pub mod output;
pub mod postprocess;
pub mod preprocess;

pub use network::{DepthNetwork, OnnxDepthNetwork};
pub use output::{save_outputs, OutputOptions, SavedOutputs};
pub use postprocess::{disp_to_depth, metric_depth, resize_bilinear, STEREO_SCALE_FACTOR};

use image::RgbImage;
use monodepth_common::{DisparityMap, ImageSize, ProcessingError};
use monodepth_core::image_io::{bgr_to_rgb, ImageError};
use monodepth_core::models::{ModelError, ModelSpec, ModelStore};
use monodepth_core::onnx_utils::{resolve_device, OnnxError};
use monodepth_core::{ConfigError, EstimatorConfig};
use ndarray::{ArrayView3, Axis};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during depth estimation
#[derive(Error, Debug)]
pub enum DepthError {
    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error(transparent)]
    Onnx(#[from] OnnxError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Invalid model output shape: expected [1, H, W] or [1, 1, H, W], got {0:?}")]
    InvalidOutputShape(Vec<i64>),

    #[error("Encoder produces {features} feature maps but the decoder takes {inputs} inputs")]
    FeatureMismatch { features: usize, inputs: usize },

    #[error("Depth decoder has no outputs")]
    NoDisparityOutput,

    #[error("Metric depth requires a stereo-trained model, '{0}' is not one")]
    MetricDepthUnsupported(String),

    #[error("Failed to create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}", path.display())]
    WriteNpy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },
}

impl From<DepthError> for ProcessingError {
    fn from(err: DepthError) -> Self {
        match err {
            DepthError::Processing(inner) => inner,
            other => ProcessingError::Other(other.to_string()),
        }
    }
}

/// Monocular depth estimator
///
/// Holds the loaded network for its whole lifetime; weights are read from
/// disk once.
pub struct DepthEstimator<N: DepthNetwork = OnnxDepthNetwork> {
    network: N,
}

impl DepthEstimator<OnnxDepthNetwork> {
    /// Select the device, make sure the checkpoint is on disk and load it
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the checkpoint cannot
    /// be found or downloaded, or a session fails to load
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, DepthError> {
        config.validate()?;

        let device = resolve_device(config.device);
        debug!("Using device {}", device);

        let spec = ModelSpec::parse_name(&config.model_name)?;
        let store = ModelStore::new(&config.models_dir)
            .with_download_base_url(config.download_base_url.clone())
            .with_expected_sha256(config.download_sha256.clone());
        let files = store.ensure(&spec.name)?;

        info!("-> Loading model from {}", files.dir.display());
        let network = OnnxDepthNetwork::load(&files, &spec, device)?;

        Ok(Self::with_network(network))
    }
}

impl<N: DepthNetwork> DepthEstimator<N> {
    pub fn with_network(network: N) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Resolution images are resized to before inference
    pub fn feed_size(&self) -> ImageSize {
        self.network.feed_size()
    }

    /// Estimate disparity for an RGB image
    ///
    /// # Returns
    /// Disparity map with the same width and height as `image`
    ///
    /// # Errors
    /// Returns error if inference fails or the network output is malformed
    pub fn predict(&mut self, image: &RgbImage) -> Result<DisparityMap, DepthError> {
        let start = Instant::now();
        let (original_width, original_height) = image.dimensions();
        if original_width == 0 || original_height == 0 {
            return Err(ProcessingError::InvalidInput("image has zero extent".to_string()).into());
        }

        let input = preprocess::preprocess(image, self.network.feed_size());
        let output = self.network.forward(&input)?;

        let (batch, channels, height, width) = output.dim();
        if batch != 1 || channels != 1 || height == 0 || width == 0 {
            return Err(DepthError::InvalidOutputShape(
                [batch, channels, height, width]
                    .iter()
                    .map(|&d| d as i64)
                    .collect(),
            ));
        }
        let disp = output.index_axis(Axis(0), 0).index_axis_move(Axis(0), 0);

        let resized = resize_bilinear(&disp, original_height as usize, original_width as usize);
        let map = DisparityMap::from_array(resized);

        debug!(
            "Disparity {}x{} -> {} (min {:.4}, max {:.4}) in {:?}",
            width,
            height,
            map.size(),
            map.min(),
            map.max(),
            start.elapsed()
        );
        Ok(map)
    }

    /// Estimate disparity for one BGR `H x W x 3` image
    pub fn run_single_image(&mut self, image: ArrayView3<'_, u8>) -> Result<DisparityMap, DepthError> {
        let rgb = bgr_to_rgb(image)?;
        let map = self.predict(&rgb)?;
        info!("-> Done!");
        Ok(map)
    }

    /// Estimate disparity for a batch of BGR images, in order
    ///
    /// Stops at the first image that fails.
    pub fn run_images(
        &mut self,
        images: &[ArrayView3<'_, u8>],
    ) -> Result<Vec<DisparityMap>, DepthError> {
        let mut results = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let rgb = bgr_to_rgb(image.view())?;
            results.push(self.predict(&rgb)?);
            debug!("Processed {} of {} images", idx + 1, images.len());
        }
        info!("-> Done!");
        Ok(results)
    }
}
