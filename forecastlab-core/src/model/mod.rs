//! ARIMA-family model fitting and forecasting.

pub mod arma;
pub mod config;
pub mod diff;
pub mod exog;
pub mod fitter;
pub mod optimize;
pub mod regression;

pub use config::{ConfigError, ModelConfig, ModelFamily, Order, TrainWindow};
pub use exog::ExogenousMatrix;
pub use fitter::{
    fit, fit_result, min_observations, FailureKind, FitFailure, FitOptions, FitResult, FittedModel,
};
