//! Pipeline integration tests
//!
//! Runs the full predict -> save pipeline through an in-process network, plus
//! an end-to-end check against real checkpoints when they are installed.
//!
//! Run the end-to-end test with:
//!   MONODEPTH_MODELS_DIR=models cargo test --release --test pipeline_integration -- --ignored

use image::{Rgb, RgbImage};
use monodepth_common::{DisparityMap, ImageSize};
use monodepth_core::image_io::{rgb_to_bgr, save_image};
use monodepth_core::models::ModelStore;
use monodepth_core::{Device, EstimatorConfig};
use monodepth_estimation::{save_outputs, DepthError, DepthEstimator, DepthNetwork, OutputOptions};
use ndarray::{Array2, Array4};
use std::path::PathBuf;

/// Disparity grows linearly from the top row (far) to the bottom row (near),
/// the way a road scene looks to a forward-facing camera.
struct GroundPlaneNetwork {
    feed_size: ImageSize,
}

impl DepthNetwork for GroundPlaneNetwork {
    fn feed_size(&self) -> ImageSize {
        self.feed_size
    }

    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>, DepthError> {
        let (_, _, h, w) = input.dim();
        let (out_h, out_w) = (h / 2, w / 2);
        Ok(Array4::from_shape_fn((1, 1, out_h, out_w), |(_, _, y, _)| {
            0.05 + 0.9 * y as f32 / (out_h - 1) as f32
        }))
    }
}

fn ground_plane_estimator() -> DepthEstimator<GroundPlaneNetwork> {
    DepthEstimator::with_network(GroundPlaneNetwork {
        feed_size: ImageSize::new(64, 32),
    })
}

fn test_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

#[test]
fn test_disparity_matches_kitti_resolution() {
    let mut estimator = ground_plane_estimator();
    let bgr = rgb_to_bgr(&test_image(1242, 375));

    let disp = estimator.run_single_image(bgr.view()).unwrap();

    assert_eq!(disp.size(), ImageSize::new(1242, 375));
    assert!(disp.min() >= 0.05 - 1e-4);
    assert!(disp.max() <= 0.95 + 1e-4);

    // Near rows have larger disparity than far rows, in every column
    for x in [0, 600, 1241] {
        assert!(disp.get(x, 370).unwrap() > disp.get(x, 5).unwrap());
    }
}

#[test]
fn test_batch_and_single_entry_points_agree() {
    let mut estimator = ground_plane_estimator();
    let images = [rgb_to_bgr(&test_image(320, 96)), rgb_to_bgr(&test_image(100, 60))];

    let batch = estimator
        .run_images(&[images[0].view(), images[1].view()])
        .unwrap();
    let single: Vec<DisparityMap> = images
        .iter()
        .map(|img| estimator.run_single_image(img.view()).unwrap())
        .collect();

    assert_eq!(batch, single);
}

#[test]
fn test_predict_and_save_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("scene.png");
    save_image(&test_image(160, 48), &image_path, 100).unwrap();

    let mut estimator = ground_plane_estimator();
    let image = monodepth_core::image_io::load_image(&image_path).unwrap();
    let disp = estimator.predict(&image).unwrap();

    let saved = save_outputs(dir.path(), "scene", &disp, &OutputOptions::default()).unwrap();

    let scaled: Array2<f32> = ndarray_npy::read_npy(&saved.npy).unwrap();
    assert_eq!(scaled.dim(), (48, 160));
    // Scaled disparity lies within [1 / max_depth, 1 / min_depth]
    assert!(scaled.iter().all(|&v| (0.01..=10.0).contains(&v)));

    let colormap = image::open(&saved.colormap).unwrap().to_rgb8();
    assert_eq!(colormap.dimensions(), (160, 48));
    let luminance = |p: &Rgb<u8>| u32::from(p[0]) + u32::from(p[1]) + u32::from(p[2]);
    assert!(luminance(colormap.get_pixel(80, 46)) > luminance(colormap.get_pixel(80, 1)));
}

#[test]
fn test_missing_checkpoint_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = EstimatorConfig {
        models_dir: dir.path().to_path_buf(),
        device: Device::Cpu,
        ..EstimatorConfig::default()
    };

    match DepthEstimator::from_config(&config) {
        Err(DepthError::Model(err)) => assert!(err.to_string().contains("mono_640x192")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("loading should fail without checkpoints"),
    }
}

#[test]
#[ignore = "requires exported ONNX checkpoints under MONODEPTH_MODELS_DIR"]
fn test_end_to_end_with_pretrained_model() {
    let models_dir = std::env::var("MONODEPTH_MODELS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("models"));
    if !ModelStore::new(&models_dir)
        .files("mono_640x192")
        .is_complete()
    {
        eprintln!(
            "Skipping: mono_640x192 not installed in {}",
            models_dir.display()
        );
        return;
    }

    let config = EstimatorConfig {
        models_dir,
        device: Device::Cpu,
        ..EstimatorConfig::default()
    };
    let mut estimator = DepthEstimator::from_config(&config).expect("Failed to load model");
    assert_eq!(estimator.feed_size(), ImageSize::new(640, 192));

    let bgr = rgb_to_bgr(&test_image(1242, 375));
    let disp = estimator.run_single_image(bgr.view()).expect("Inference failed");

    assert_eq!(disp.size(), ImageSize::new(1242, 375));
    // Decoder disparities come out of a sigmoid
    assert!(disp.min() >= 0.0 && disp.max() <= 1.0);
}
