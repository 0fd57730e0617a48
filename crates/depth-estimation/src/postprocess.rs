//! Disparity post-processing: resampling and disparity to depth conversion

use monodepth_common::DisparityMap;
use ndarray::{Array2, ArrayView2};

/// Scale from stereo-trained disparity to metric depth (KITTI baseline)
pub const STEREO_SCALE_FACTOR: f32 = 5.4;

/// Bilinear resize with half-pixel centers (`align_corners = false`).
///
/// Source coordinates are `(dst + 0.5) * in / out - 0.5`, clamped at zero;
/// the far neighbour is clamped to the last row/column.
#[must_use]
pub fn resize_bilinear(input: &ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = input.dim();
    if (in_h, in_w) == (out_h, out_w) {
        return input.to_owned();
    }
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Array2::zeros((out_h, out_w));
    }

    let ys = source_taps(in_h, out_h);
    let xs = source_taps(in_w, out_w);

    Array2::from_shape_fn((out_h, out_w), |(oy, ox)| {
        let (y0, y1, wy) = ys[oy];
        let (x0, x1, wx) = xs[ox];

        let top = input[[y0, x0]] * (1.0 - wx) + input[[y0, x1]] * wx;
        let bottom = input[[y1, x0]] * (1.0 - wx) + input[[y1, x1]] * wx;
        top * (1.0 - wy) + bottom * wy
    })
}

/// Per output index: (near source index, far source index, far weight)
fn source_taps(in_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(in_len - 1);
            let i1 = (i0 + 1).min(in_len - 1);
            (i0, i1, src - i0 as f32)
        })
        .collect()
}

/// Convert a sigmoid disparity in `[0, 1]` to (scaled disparity, depth)
#[must_use]
pub fn disp_to_depth_value(disp: f32, min_depth: f32, max_depth: f32) -> (f32, f32) {
    let min_disp = 1.0 / max_depth;
    let max_disp = 1.0 / min_depth;
    let scaled = min_disp + (max_disp - min_disp) * disp;
    (scaled, 1.0 / scaled)
}

/// Convert a disparity map to (scaled disparity, depth) maps
#[must_use]
pub fn disp_to_depth(
    disp: &DisparityMap,
    min_depth: f32,
    max_depth: f32,
) -> (Array2<f32>, Array2<f32>) {
    let scaled = disp
        .as_array()
        .mapv(|d| disp_to_depth_value(d, min_depth, max_depth).0);
    let depth = scaled.mapv(|s| 1.0 / s);
    (scaled, depth)
}

/// Metric depth for stereo-trained models
#[must_use]
pub fn metric_depth(disp: &DisparityMap, min_depth: f32, max_depth: f32) -> Array2<f32> {
    let (_, depth) = disp_to_depth(disp, min_depth, max_depth);
    depth * STEREO_SCALE_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: &Array2<f32>, b: &Array2<f32>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_resize_identity() {
        let input = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(resize_bilinear(&input.view(), 2, 2), input);
    }

    #[test]
    fn test_resize_upsample_half_pixel() {
        let input = array![[0.0, 1.0]];
        let out = resize_bilinear(&input.view(), 1, 4);
        // src x = -0.25 -> 0, 0.25, 0.75, 1.25 -> clamped neighbour
        assert_close(&out, &array![[0.0, 0.25, 0.75, 1.0]]);
    }

    #[test]
    fn test_resize_upsample_2d() {
        let input = array![[1.0, 2.0], [3.0, 4.0]];
        let out = resize_bilinear(&input.view(), 4, 4);
        let expected = array![
            [1.0, 1.25, 1.75, 2.0],
            [1.5, 1.75, 2.25, 2.5],
            [2.5, 2.75, 3.25, 3.5],
            [3.0, 3.25, 3.75, 4.0],
        ];
        assert_close(&out, &expected);
    }

    #[test]
    fn test_resize_downsample_averages_pairs() {
        let input = array![[0.0, 2.0, 4.0, 6.0]];
        let out = resize_bilinear(&input.view(), 1, 2);
        // src x = 0.5 and 2.5
        assert_close(&out, &array![[1.0, 5.0]]);
    }

    #[test]
    fn test_resize_constant_stays_constant() {
        let input = Array2::from_elem((6, 20), 0.42f32);
        let out = resize_bilinear(&input.view(), 375, 1242);
        assert_eq!(out.dim(), (375, 1242));
        assert!(out.iter().all(|&v| (v - 0.42).abs() < 1e-6));
    }

    #[test]
    fn test_disp_to_depth_bounds() {
        let (scaled, depth) = disp_to_depth_value(0.0, 0.1, 100.0);
        assert!((scaled - 0.01).abs() < 1e-6);
        assert!((depth - 100.0).abs() < 1e-3);

        let (scaled, depth) = disp_to_depth_value(1.0, 0.1, 100.0);
        assert!((scaled - 10.0).abs() < 1e-4);
        assert!((depth - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_metric_depth_scales_depth() {
        let disp = DisparityMap::new(2, 1, vec![0.0, 1.0]).unwrap();
        let depth = metric_depth(&disp, 0.1, 100.0);
        assert!((depth[[0, 0]] - 540.0).abs() < 1e-2);
        assert!((depth[[0, 1]] - 0.54).abs() < 1e-4);
    }
}
