//! Image to network-input tensor conversion

use image::imageops::{self, FilterType};
use image::RgbImage;
use monodepth_common::ImageSize;
use ndarray::Array4;

/// Resize `image` to `feed_size` with a Lanczos3 filter and convert it to a
/// `[1, 3, H, W]` tensor with values in `[0, 1]`.
///
/// No mean/std normalization is applied; the depth networks expect raw
/// `[0, 1]` intensities.
#[must_use]
pub fn preprocess(image: &RgbImage, feed_size: ImageSize) -> Array4<f32> {
    let resized;
    let source = if image.dimensions() == (feed_size.width, feed_size.height) {
        image
    } else {
        resized = imageops::resize(
            image,
            feed_size.width,
            feed_size.height,
            FilterType::Lanczos3,
        );
        &resized
    };

    to_tensor(source)
}

/// CHW float tensor with a leading batch dimension, `u8 / 255`
#[must_use]
pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
        tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
        tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_to_tensor_layout_and_range() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([255, (x * 100) as u8, (y * 51) as u8]));
        let tensor = to_tensor(&img);

        assert_eq!(tensor.dim(), (1, 3, 2, 3));
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        assert!((tensor[[0, 1, 0, 2]] - 200.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 1, 0]] - 0.2).abs() < 1e-6);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_resizes_to_feed_size() {
        let img = RgbImage::from_pixel(1242, 375, Rgb([200, 100, 50]));
        let tensor = preprocess(&img, ImageSize::new(640, 192));

        assert_eq!(tensor.dim(), (1, 3, 192, 640));
        // A uniform image stays uniform through the Lanczos filter
        assert!((tensor[[0, 0, 96, 320]] - 200.0 / 255.0).abs() < 1e-2);
        assert!((tensor[[0, 2, 0, 0]] - 50.0 / 255.0).abs() < 1e-2);
    }

    #[test]
    fn test_preprocess_keeps_feed_sized_image() {
        let img = RgbImage::from_fn(8, 4, |x, y| Rgb([(x * 30) as u8, (y * 60) as u8, 7]));
        let tensor = preprocess(&img, ImageSize::new(8, 4));
        assert_eq!(tensor, to_tensor(&img));
    }
}
