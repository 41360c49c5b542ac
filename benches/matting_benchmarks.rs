use bgremove_invoker::{
    config::AlphaMattingOptions,
    matting::{estimate_foreground, ClosedFormMatting, Trimap},
    utils::post_process_mask,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Disc subject with a soft edge, plus its mask
fn scene(size: u32) -> (RgbImage, GrayImage) {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 3.0;
    let coverage = |x: u32, y: u32| {
        let d = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
        (radius - d + 2.0).clamp(0.0, 4.0) / 4.0
    };

    let image = RgbImage::from_fn(size, size, |x, y| {
        let a = coverage(x, y);
        let mix = |f: f32, b: f32| (f * a + b * (1.0 - a)) as u8;
        Rgb([mix(220.0, 30.0), mix(50.0, 90.0), mix(40.0, 200.0)])
    });
    let mask = GrayImage::from_fn(size, size, |x, y| Luma([(coverage(x, y) * 255.0) as u8]));
    (image, mask)
}

fn bench_trimap(c: &mut Criterion) {
    let (_, mask) = scene(512);
    let options = AlphaMattingOptions::default();
    c.bench_function("trimap_from_mask_512", |b| {
        b.iter(|| Trimap::from_mask(black_box(&mask), &options));
    });
    c.bench_function("post_process_mask_512", |b| {
        b.iter(|| post_process_mask(black_box(&mask)));
    });
}

fn bench_closed_form(c: &mut Criterion) {
    let mut group = c.benchmark_group("closed_form_alpha");
    group.sample_size(10);
    let options = AlphaMattingOptions {
        erode_size: 3,
        ..AlphaMattingOptions::default()
    };

    for size in [64u32, 128] {
        let (image, mask) = scene(size);
        let trimap = Trimap::from_mask(&mask, &options);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ClosedFormMatting::default().estimate_alpha(black_box(&image), &trimap));
        });
    }
    group.finish();
}

fn bench_foreground(c: &mut Criterion) {
    let (image, mask) = scene(256);
    let options = AlphaMattingOptions {
        erode_size: 3,
        ..AlphaMattingOptions::default()
    };
    let trimap = Trimap::from_mask(&mask, &options);
    let Ok(alpha) = ClosedFormMatting::default().estimate_alpha(&image, &trimap) else {
        return;
    };

    let mut group = c.benchmark_group("estimate_foreground");
    group.sample_size(20);
    group.bench_with_input(BenchmarkId::from_parameter(256), &alpha, |b, alpha| {
        b.iter(|| estimate_foreground(black_box(&image), alpha));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_trimap,
    bench_closed_form,
    bench_foreground
);
criterion_main!(benches);
