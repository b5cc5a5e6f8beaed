//! ForecastLab Runner — model comparison, walk-forward and future forecasts,
//! metrics, configuration, loading and export.
//!
//! This crate builds on `forecastlab-core` to provide:
//! - Grid comparison of ARIMA-family configurations on the rayon pool
//! - Walk-forward forecasting with strict no-lookahead visibility
//! - Future forecasts beyond the last observed date
//! - Prediction error metrics (RMSE, MAE, MAPE)
//! - Explicit feature and comparison caches
//! - TOML run configuration and CSV loading with synthetic fallback
//! - JSON / CSV / Parquet / Markdown export
//! - Tracing subscriber setup for binaries

pub mod cache;
pub mod compare;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod future;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod walk_forward;

pub use cache::{comparison_key, ComparisonCache, FeatureCache};
pub use compare::{
    compare_models, compare_series, rank, CompareError, CompareOptions, Comparison, FailedFit,
    ModelGrid,
};
pub use config::{RunConfig, RunConfigError, RunId};
pub use data_loader::{load_csv, load_series, LoadError, LoadedSeries};
pub use future::{future_forecast, FutureConfig, FutureError, FuturePoint};
pub use logging::{init_logging, LogFormat};
pub use metrics::{prediction_metrics, PredictionMetrics};
pub use runner::{run_from_series, run_pipeline, RunError, RunReport};
pub use walk_forward::{
    merge_forecasts, walk_forward_forecast, ForecastRecord, WalkForward, WalkForwardConfig,
    WalkForwardError, FORECAST_STEPS,
};
