/// Common types and utilities for monocular depth inference
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Pixel dimensions of an image or tensor plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    #[must_use]
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-pixel disparity (inverse depth) values, row-major
///
/// The buffer always holds exactly `width * height` values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisparityMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DisparityMap {
    /// Build a disparity map, checking that `data` covers `width * height` pixels
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(ProcessingError::InvalidInput(format!(
                "disparity data has {} values, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a disparity map from a `[height, width]` array
    #[must_use]
    pub fn from_array(array: Array2<f32>) -> Self {
        let (height, width) = array.dim();
        let data = if array.is_standard_layout() {
            // The backing buffer may extend past either end of a sliced array
            let (mut buffer, offset) = array.into_raw_vec_and_offset();
            buffer.drain(..offset.unwrap_or(0));
            buffer.truncate(height * width);
            buffer
        } else {
            array.iter().copied().collect()
        };
        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major values
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    /// Value at column `x`, row `y`
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    #[must_use]
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    #[must_use]
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&v| f64::from(v)).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Percentile with linear interpolation between the closest ranks.
    ///
    /// `p` is in percent and is clamped to `[0, 100]`. Returns `None` for an
    /// empty map.
    #[must_use]
    pub fn percentile(&self, p: f32) -> Option<f32> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort_unstable_by(f32::total_cmp);

        let rank = f64::from(p.clamp(0.0, 100.0)) / 100.0 * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = (rank - lo as f64) as f32;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }

    /// View as a `[height, width]` array
    #[must_use]
    pub fn as_array(&self) -> ArrayView2<'_, f32> {
        ArrayView2::from_shape((self.height as usize, self.width as usize), &self.data)
            .unwrap_or_else(|_| unreachable!("buffer length matches width * height"))
    }

    /// Convert into an owned `[height, width]` array
    #[must_use]
    pub fn into_array(self) -> Array2<f32> {
        let shape = (self.height as usize, self.width as usize);
        Array2::from_shape_vec(shape, self.data)
            .unwrap_or_else(|_| unreachable!("buffer length matches width * height"))
    }
}
