//! ForecastLab Core — price series, leakage-free features, ARIMA-family
//! fitting and trading signals.
//!
//! This crate holds everything that does not need threads or I/O:
//! - Domain types (price bars, validated series, forecast rows)
//! - Feature pipeline with a strict no-lookahead contract
//! - Model fitter (differencing, regression, CSS estimation, forecasting)
//! - Signal generator
//! - Deterministic synthetic series for tests and demos

pub mod domain;
pub mod features;
pub mod model;
pub mod signals;
pub mod synthetic;

pub use domain::{ForecastRow, PredictionColumn, PriceBar, PriceSeries, SeriesError};
pub use features::{derive, FeatureColumn, FeatureRow, FeatureTable};
pub use model::{
    fit, ConfigError, FailureKind, FitFailure, FitOptions, FitResult, FittedModel, ModelConfig,
    ModelFamily, Order, TrainWindow,
};
pub use signals::{trading_signals, Signal, SignalRecord, SignalThresholds};
