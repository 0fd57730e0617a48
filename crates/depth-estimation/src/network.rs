//! Encoder/decoder depth networks
//!
//! The encoder maps a `[1, 3, H, W]` image tensor to a pyramid of feature
//! maps; the decoder turns those features into sigmoid disparities at several
//! scales. Only the full-resolution scale is used for prediction.

use crate::DepthError;
use monodepth_common::ImageSize;
use monodepth_core::models::{ModelFiles, ModelSpec};
use monodepth_core::onnx_utils::{create_session, Device};
use ndarray::{Array4, ArrayD, IxDyn};
use ort::session::Session;
use ort::value::{DynValue, Tensor, TensorRef};
use std::time::Instant;
use tracing::{debug, info};

/// Output names recognised as the full-resolution disparity
const DISP_OUTPUT_NAMES: &[&str] = &["disp_0", "disp0", "('disp', 0)", "(\"disp\", 0)"];

/// A network producing a disparity map from an image tensor
pub trait DepthNetwork {
    /// Input resolution the weights were trained with
    fn feed_size(&self) -> ImageSize;

    /// Run the forward pass.
    ///
    /// `input` is `[1, 3, feed_h, feed_w]` in `[0, 1]`; the result is the
    /// scale-0 disparity shaped `[1, 1, h, w]`.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>, DepthError>;
}

/// Pretrained encoder and depth decoder, each an ONNX Runtime session
pub struct OnnxDepthNetwork {
    encoder: Session,
    decoder: Session,
    feed_size: ImageSize,
    feature_names: Vec<String>,
    decoder_input_names: Vec<String>,
    disp_output: String,
}

impl OnnxDepthNetwork {
    /// Load the encoder and decoder checkpoints of `spec` onto `device`
    pub fn load(files: &ModelFiles, spec: &ModelSpec, device: Device) -> Result<Self, DepthError> {
        info!("   Loading pretrained encoder");
        let encoder = create_session(&files.encoder, device)?;

        let feed_size = metadata_feed_size(&encoder)
            .or_else(|| {
                encoder
                    .inputs
                    .first()
                    .and_then(|input| input.input_type.tensor_shape())
                    .and_then(|shape| feed_size_from_dims(shape))
            })
            .unwrap_or(spec.feed_size);
        debug!("Encoder feed size: {}", feed_size);

        info!("   Loading pretrained decoder");
        let decoder = create_session(&files.decoder, device)?;

        let feature_names: Vec<String> = encoder.outputs.iter().map(|o| o.name.clone()).collect();
        let decoder_input_names: Vec<String> =
            decoder.inputs.iter().map(|i| i.name.clone()).collect();

        if feature_names.len() != decoder_input_names.len() {
            return Err(DepthError::FeatureMismatch {
                features: feature_names.len(),
                inputs: decoder_input_names.len(),
            });
        }

        let disp_output = select_disp_output(decoder.outputs.iter().map(|o| o.name.as_str()))
            .ok_or(DepthError::NoDisparityOutput)?;
        debug!(
            "Encoder features {:?} -> decoder inputs {:?}, disparity output '{}'",
            feature_names, decoder_input_names, disp_output
        );

        Ok(Self {
            encoder,
            decoder,
            feed_size,
            feature_names,
            decoder_input_names,
            disp_output,
        })
    }
}

impl DepthNetwork for OnnxDepthNetwork {
    fn feed_size(&self) -> ImageSize {
        self.feed_size
    }

    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>, DepthError> {
        let start = Instant::now();

        let input_tensor = TensorRef::from_array_view(input.view())?;
        let features = {
            let outputs = self.encoder.run(ort::inputs![input_tensor])?;
            self.feature_names
                .iter()
                .map(|name| extract_owned(&outputs[name.as_str()]))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut decoder_inputs = Vec::with_capacity(features.len());
        for (name, feature) in self.decoder_input_names.iter().zip(features) {
            decoder_inputs.push((name.clone(), Tensor::from_array(feature)?));
        }

        let outputs = self.decoder.run(decoder_inputs)?;
        let (shape, data) = outputs[self.disp_output.as_str()].try_extract_tensor::<f32>()?;
        let disparity = disparity_from_output(shape, data)?;

        debug!(
            "Forward pass {:?} -> {:?} in {:?}",
            input.dim(),
            disparity.dim(),
            start.elapsed()
        );
        Ok(disparity)
    }
}

fn extract_owned(value: &DynValue) -> Result<ArrayD<f32>, DepthError> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
        .map_err(|_| DepthError::InvalidOutputShape(shape.to_vec()))
}

/// Feed size recorded in the encoder's custom metadata (`height`, `width`)
fn metadata_feed_size(session: &Session) -> Option<ImageSize> {
    let metadata = session.metadata().ok()?;
    let height = metadata.custom("height").ok()??.trim().parse::<u32>().ok()?;
    let width = metadata.custom("width").ok()??.trim().parse::<u32>().ok()?;
    (width > 0 && height > 0).then(|| ImageSize::new(width, height))
}

/// Feed size from a static `[N, C, H, W]` input shape; dynamic axes are negative
#[must_use]
pub fn feed_size_from_dims(dims: &[i64]) -> Option<ImageSize> {
    match dims {
        [_, _, h, w] if *h > 0 && *w > 0 => Some(ImageSize::new(*w as u32, *h as u32)),
        _ => None,
    }
}

/// Pick the full-resolution disparity among the decoder outputs
pub fn select_disp_output<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let names: Vec<&str> = names.into_iter().collect();
    names
        .iter()
        .find(|name| DISP_OUTPUT_NAMES.contains(*name))
        .or_else(|| names.first())
        .map(|name| (*name).to_string())
}

/// Normalise a `[1, H, W]` or `[1, 1, H, W]` output to `[1, 1, H, W]`
pub fn disparity_from_output(shape: &[i64], data: &[f32]) -> Result<Array4<f32>, DepthError> {
    let (height, width) = match shape {
        [1, h, w] | [1, 1, h, w] if *h > 0 && *w > 0 => (*h as usize, *w as usize),
        _ => return Err(DepthError::InvalidOutputShape(shape.to_vec())),
    };

    Array4::from_shape_vec((1, 1, height, width), data.to_vec())
        .map_err(|_| DepthError::InvalidOutputShape(shape.to_vec()))
}
