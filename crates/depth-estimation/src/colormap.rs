//! Magma visualisation of disparity maps

use image::{Rgb, RgbImage};
use monodepth_common::DisparityMap;
use once_cell::sync::Lazy;

/// Upper normalisation bound, as a percentile of the disparity values
pub const VMAX_PERCENTILE: f32 = 95.0;

const LUT_SIZE: usize = 256;

/// matplotlib's magma table
static MAGMA: Lazy<[[u8; 3]; LUT_SIZE]> = Lazy::new(|| {
    let mut lut = [[0u8; 3]; LUT_SIZE];
    for (i, entry) in lut.iter_mut().enumerate() {
        let c = colorous::MAGMA.eval_rational(i, LUT_SIZE);
        *entry = [c.r, c.g, c.b];
    }
    lut
});

/// Colour for a normalised value in `[0, 1]`; out-of-range values are clipped
#[must_use]
pub fn magma(value: f32) -> Rgb<u8> {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let index = ((v * LUT_SIZE as f32) as usize).min(LUT_SIZE - 1);
    Rgb(MAGMA[index])
}

/// Colourise a disparity map with `vmin = min` and `vmax = 95th percentile`
#[must_use]
pub fn colorize(disp: &DisparityMap) -> RgbImage {
    let vmin = disp.min();
    let vmax = disp.percentile(VMAX_PERCENTILE).unwrap_or(vmin);
    let range = vmax - vmin;

    RgbImage::from_fn(disp.width(), disp.height(), |x, y| {
        let value = disp.get(x, y).unwrap_or(vmin);
        let normalized = if range > f32::EPSILON {
            (value - vmin) / range
        } else {
            0.0
        };
        magma(normalized)
    })
}
