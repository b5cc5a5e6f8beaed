//! Deterministic synthetic price series for tests, benches and `--synthetic` runs.
//!
//! The RNG is seeded from a BLAKE3 hash of the label, so the same label always
//! yields the same series. These series are clearly fake and only used where
//! no real data is supplied.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{PriceBar, PriceSeries, SeriesError};

/// First date of every synthetic series.
pub fn synthetic_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default()
}

fn rng_for(label: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

/// Consecutive daily bars built from a log-price path.
fn bars_from_log_path(rng: &mut StdRng, log_path: &[f64]) -> Vec<PriceBar> {
    let start = synthetic_start();
    let mut bars = Vec::with_capacity(log_path.len());
    let mut prev_close = log_path.first().map(|v| v.exp()).unwrap_or(1.0);

    for (date, lp) in start.iter_days().zip(log_path) {
        let close = lp.exp();
        let open = prev_close * (1.0 + rng.gen_range(-0.002..0.002));
        let volume = rng.gen_range(500_000.0..5_000_000.0);
        bars.push(PriceBar::new(date, open, close, volume));
        prev_close = close;
    }
    bars
}

/// Random walk in log space: each daily log return is uniform in `[-step, step)`.
///
/// Fails only for `n == 0` or a non-positive `start_price`.
pub fn random_walk_series(
    label: &str,
    n: usize,
    start_price: f64,
    step: f64,
) -> Result<PriceSeries, SeriesError> {
    let mut rng = rng_for(label);
    let mut path = Vec::with_capacity(n);
    let mut lp = start_price.ln();
    for i in 0..n {
        if i > 0 && step > 0.0 {
            lp += rng.gen_range(-step..step);
        }
        path.push(lp);
    }
    PriceSeries::new(bars_from_log_path(&mut rng, &path))
}

/// Deterministic log-linear trend with uniform noise of amplitude `noise`
/// around it (not accumulated).
pub fn log_trend_series(
    label: &str,
    n: usize,
    start_price: f64,
    daily_drift: f64,
    noise: f64,
) -> Result<PriceSeries, SeriesError> {
    let mut rng = rng_for(label);
    let base = start_price.ln();
    let path: Vec<f64> = (0..n)
        .map(|i| {
            let eps = if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };
            base + daily_drift * i as f64 + eps
        })
        .collect();
    PriceSeries::new(bars_from_log_path(&mut rng, &path))
}
