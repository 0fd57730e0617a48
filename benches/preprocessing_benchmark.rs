// Preprocessing benchmark - Lanczos resize + tensor conversion, and the
// bilinear disparity upsample back to camera resolution
//
// Run with: cargo bench --bench preprocessing_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageBuffer, Rgb, RgbImage};
use monodepth_common::ImageSize;
use monodepth_estimation::preprocess::{preprocess, to_tensor};
use monodepth_estimation::resize_bilinear;
use ndarray::Array2;

fn test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            ((x + y) % 256) as u8,
            ((x * 2) % 256) as u8,
            ((y * 2) % 256) as u8,
        ])
    })
}

/// Benchmark preprocessing from common camera resolutions to each feed size
fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    let sources = [(1242, 375, "kitti"), (1280, 720, "720p"), (1920, 1080, "1080p")];
    let feeds = [ImageSize::new(640, 192), ImageSize::new(1024, 320)];

    for (width, height, name) in sources {
        let image = test_image(width, height);
        for feed in feeds {
            group.bench_with_input(
                BenchmarkId::new(name, feed.to_string()),
                &image,
                |b, img| {
                    b.iter(|| black_box(preprocess(black_box(img), feed)));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark individual stages: resize vs tensor conversion
fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing_stages");
    let image = test_image(1242, 375);

    group.bench_function("lanczos_resize_640x192", |b| {
        b.iter(|| {
            black_box(image::imageops::resize(
                black_box(&image),
                640,
                192,
                image::imageops::FilterType::Lanczos3,
            ))
        });
    });

    let feed_image = test_image(640, 192);
    group.bench_function("to_tensor_640x192", |b| {
        b.iter(|| black_box(to_tensor(black_box(&feed_image))));
    });

    group.finish();
}

/// Benchmark the disparity upsample to the original resolution
fn bench_postprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    let disp = Array2::from_shape_fn((192, 640), |(y, x)| (y * 640 + x) as f32 / 122_880.0);

    for (height, width) in [(375, 1242), (1080, 1920)] {
        group.bench_function(format!("bilinear_{width}x{height}"), |b| {
            b.iter(|| black_box(resize_bilinear(&disp.view(), height, width)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_preprocessing, bench_stages, bench_postprocessing);
criterion_main!(benches);
