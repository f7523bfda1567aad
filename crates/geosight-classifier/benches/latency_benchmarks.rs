//! Latency benchmarks for the CPU-bound pipeline stages
//!
//! Covers everything around the model itself: sharpness scoring, tensor
//! preprocessing, score normalization, and a full service pass with a
//! constant-output engine.
//!
//! Run with: cargo bench -p geosight-classifier

use candle_core::Tensor;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Cursor;
use std::sync::Arc;

use geosight_classifier::{
    ClassificationService, InferenceEngine, ScoreNormalizer, SharpnessGate, TensorPreprocessor,
};
use geosight_core::{ClassLabel, Result, ScoreVector};

struct ConstantEngine;

impl InferenceEngine for ConstantEngine {
    fn run(&self, _input: &Tensor) -> Result<ScoreVector> {
        let mut logits = [0.0; ClassLabel::COUNT];
        logits[ClassLabel::Forest.index()] = 4.0;
        Ok(ScoreVector::new(logits))
    }

    fn name(&self) -> &str {
        "constant"
    }
}

fn noise_png(size: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(size as u64);
    let image = RgbImage::from_fn(size, size, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode benchmark image");
    buf
}

/// Benchmark the sharpness gate across tile sizes
fn benchmark_sharpness_gate(c: &mut Criterion) {
    let gate = SharpnessGate::default();

    let mut group = c.benchmark_group("Sharpness_Gate");
    group.sample_size(50);

    for size in [64u32, 224, 512] {
        let bytes = noise_png(size);
        group.bench_with_input(BenchmarkId::new("check", size), &bytes, |b, bytes| {
            b.iter(|| gate.check(black_box(bytes)))
        });
    }

    group.finish();
}

/// Benchmark decode, resize and normalize to a (1, 3, 224, 224) tensor
fn benchmark_preprocessing(c: &mut Criterion) {
    let preprocessor = TensorPreprocessor::new();

    let mut group = c.benchmark_group("Tensor_Preprocessing");
    group.sample_size(50);

    for size in [64u32, 224, 512] {
        let bytes = noise_png(size);
        group.bench_with_input(BenchmarkId::new("process", size), &bytes, |b, bytes| {
            b.iter(|| preprocessor.process(black_box(bytes)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark softmax and argmax over ten logits
fn benchmark_normalization(c: &mut Criterion) {
    let logits = ScoreVector::new([0.3, -1.2, 4.5, 0.0, 2.2, -0.7, 1.1, 3.9, -2.5, 0.8]);

    c.bench_function("score_normalize", |b| {
        b.iter(|| ScoreNormalizer::normalize(black_box(&logits)).unwrap())
    });
}

/// Full service pass, engine cost excluded
fn benchmark_service_overhead(c: &mut Criterion) {
    let service = ClassificationService::new(Arc::new(ConstantEngine));
    let bytes = noise_png(224);

    let mut group = c.benchmark_group("Service_Overhead");
    group.sample_size(30);

    group.bench_function("classify_224", |b| {
        b.iter(|| service.classify(black_box(&bytes)).unwrap())
    });

    group.bench_function("classify_224_ungated", |b| {
        let ungated = service.clone().with_gate(None);
        b.iter(|| ungated.classify(black_box(&bytes)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sharpness_gate,
    benchmark_preprocessing,
    benchmark_normalization,
    benchmark_service_overhead
);
criterion_main!(benches);
