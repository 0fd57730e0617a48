//! Image I/O and channel-order conversion
//!
//! - **mozjpeg** (SIMD-optimized) for JPEG decode/encode
//! - **image crate** for PNG and other formats
//! - BGR `H x W x 3` arrays, the layout camera capture libraries hand out,
//!   converted to and from [`RgbImage`]

use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::{Array3, ArrayView3};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during image I/O operations
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to read image file: {0}")]
    ReadError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Failed to write image file: {0}")]
    WriteError(String),

    #[error("Invalid image array: {0}")]
    InvalidShape(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ImageError> for monodepth_common::ProcessingError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidShape(msg) => monodepth_common::ProcessingError::InvalidInput(msg),
            ImageError::IoError(e) => monodepth_common::ProcessingError::IoError(e),
            other => monodepth_common::ProcessingError::ImageError(other.to_string()),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Load an image from a file path, automatically detecting format
///
/// JPEG goes through mozjpeg, everything else through the `image` crate.
///
/// # Example
/// ```no_run
/// use monodepth_core::image_io::load_image;
/// let img = load_image("frame.jpg")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage, ImageError> {
    let path = path.as_ref();

    match extension_of(path).as_str() {
        "jpg" | "jpeg" => load_jpeg_mozjpeg(path),
        _ => {
            let img = image::open(path)
                .map_err(|e| ImageError::DecodeError(format!("Failed to load image: {e}")))?;
            Ok(img.to_rgb8())
        }
    }
}

fn load_jpeg_mozjpeg(path: &Path) -> Result<RgbImage, ImageError> {
    let data = fs::read(path)
        .map_err(|e| ImageError::ReadError(format!("Failed to read JPEG file: {e}")))?;

    let d = mozjpeg::Decompress::new_mem(&data)
        .map_err(|e| ImageError::DecodeError(format!("Failed to create decompressor: {e}")))?;

    let (width, height) = (d.width(), d.height());

    let mut rgb = d
        .rgb()
        .map_err(|e| ImageError::DecodeError(format!("Failed to decode RGB: {e}")))?;

    let image_data: Vec<u8> = rgb
        .read_scanlines()
        .map_err(|e| ImageError::DecodeError(format!("Failed to read scanlines: {e}")))?;

    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width as u32, height as u32, image_data).ok_or_else(
        || {
            ImageError::DecodeError(format!(
                "Failed to create image buffer from mozjpeg output ({width}x{height})"
            ))
        },
    )
}

/// Convert a BGR `H x W x 3` array into an RGB image
pub fn bgr_to_rgb(bgr: ArrayView3<'_, u8>) -> Result<RgbImage, ImageError> {
    let (height, width, channels) = bgr.dim();
    if channels != 3 {
        return Err(ImageError::InvalidShape(format!(
            "expected 3 channels, got {channels}"
        )));
    }
    if height == 0 || width == 0 {
        return Err(ImageError::InvalidShape(format!(
            "image has zero extent ({width}x{height})"
        )));
    }

    Ok(ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([bgr[[y, x, 2]], bgr[[y, x, 1]], bgr[[y, x, 0]]])
    }))
}

/// Convert an RGB image into a BGR `H x W x 3` array
#[must_use]
pub fn rgb_to_bgr(image: &RgbImage) -> Array3<u8> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32)[2 - c]
    })
}

/// Save an RGB image as JPEG using mozjpeg
pub fn save_rgb_jpeg<P: AsRef<Path>>(
    image: &RgbImage,
    path: P,
    quality: u8,
) -> Result<(), ImageError> {
    let (width, height) = image.dimensions();

    let mut file = fs::File::create(path.as_ref())
        .map_err(|e| ImageError::WriteError(format!("Failed to create output file: {e}")))?;

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(f32::from(quality.clamp(1, 100)));

    let mut comp_started = comp
        .start_compress(&mut file)
        .map_err(|e| ImageError::EncodeError(format!("Failed to start compression: {e}")))?;

    comp_started
        .write_scanlines(image.as_raw())
        .map_err(|e| ImageError::EncodeError(format!("Failed to write scanlines: {e}")))?;

    comp_started
        .finish()
        .map_err(|e| ImageError::EncodeError(format!("Failed to finish compression: {e}")))?;

    Ok(())
}

/// Save an RGB image, JPEG via mozjpeg and other extensions via the `image` crate
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P, quality: u8) -> Result<(), ImageError> {
    let path = path.as_ref();
    match extension_of(path).as_str() {
        "jpg" | "jpeg" => save_rgb_jpeg(image, path, quality),
        _ => image
            .save(path)
            .map_err(|e| ImageError::WriteError(format!("Failed to save image: {e}"))),
    }
}

/// Sorted list of files in `dir` whose extension matches `ext` (case-insensitive)
pub fn find_images<P: AsRef<Path>>(dir: P, ext: &str) -> Result<Vec<PathBuf>, ImageError> {
    let wanted = ext.trim_start_matches('.').to_lowercase();
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && extension_of(&path) == wanted {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}
