//! Criterion benchmarks for ForecastLab hot paths.
//!
//! Benchmarks:
//! 1. Feature derivation over multi-year daily series
//! 2. Single-model fits across the comparison grid's orders
//! 3. Walk-forward step (fit + 3-step forecast) at the default order

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use forecastlab_core::features::derive;
use forecastlab_core::model::{fit, FitOptions, ModelConfig};
use forecastlab_core::synthetic;

// ── Helpers ──────────────────────────────────────────────────────────

fn log_closes(n: usize) -> Vec<f64> {
    let series = synthetic::random_walk_series("bench", n, 30_000.0, 0.03)
        .expect("synthetic series");
    derive(&series).log_closes()
}

// ── 1. Feature derivation ────────────────────────────────────────────

fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_derive");
    for n in [500usize, 1_500, 3_000] {
        let series = synthetic::random_walk_series("bench", n, 30_000.0, 0.03)
            .expect("synthetic series");
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| derive(black_box(s)))
        });
    }
    group.finish();
}

// ── 2. Model fits ────────────────────────────────────────────────────

fn bench_fit(c: &mut Criterion) {
    let y = log_closes(1_500);
    let options = FitOptions::default();
    let configs = [
        ("random_walk", ModelConfig::random_walk()),
        ("arma_2_2", ModelConfig::arma(2, 2)),
        ("arima_1_1_1", ModelConfig::arima(1, 1, 1)),
        ("arima_2_1_2", ModelConfig::arima(2, 1, 2)),
        ("arima_2_3_2", ModelConfig::arima(2, 3, 2)),
    ];

    let mut group = c.benchmark_group("fit");
    group.sample_size(20);
    for (name, cfg) in configs {
        group.bench_function(name, |b| {
            b.iter(|| {
                let _ = fit(black_box(&y), &cfg, None, &options);
            })
        });
    }
    group.finish();
}

// ── 3. Walk-forward step ─────────────────────────────────────────────

fn bench_walk_forward_step(c: &mut Criterion) {
    let y = log_closes(1_000);
    let cfg = ModelConfig::arima(2, 1, 2);
    let options = FitOptions::default();

    c.bench_function("walk_forward_step_2_1_2", |b| {
        b.iter(|| {
            fit(black_box(&y), &cfg, None, &options)
                .and_then(|m| m.forecast(3))
                .ok()
        })
    });
}

criterion_group!(benches, bench_derive, bench_fit, bench_walk_forward_step);
criterion_main!(benches);
