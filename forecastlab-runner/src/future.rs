//! Future forecast: one fit on the whole history, projected past the last date.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use forecastlab_core::features::FeatureTable;
use forecastlab_core::model::{fit, ConfigError, FitFailure, FitOptions, ModelConfig, Order};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FutureConfig {
    pub days_ahead: usize,
    pub order: Order,
}

impl Default for FutureConfig {
    fn default() -> Self {
        Self {
            days_ahead: 7,
            order: Order::new(2, 1, 2),
        }
    }
}

impl FutureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days_ahead == 0 {
            return Err(ConfigError::Invalid("days_ahead must be at least 1".into()));
        }
        ModelConfig::from_order(self.order).validate_for_forecast()
    }
}

/// One projected day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturePoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    pub log_predicted_price: f64,
}

#[derive(Debug, Error)]
pub enum FutureError {
    #[error("feature table is empty")]
    EmptyInput,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fit on full history failed: {0}")]
    Fit(#[from] FitFailure),
}

/// Fit `config.order` on every target log close in `table` and forecast
/// `days_ahead` consecutive calendar days after the last row.
pub fn future_forecast(
    table: &FeatureTable,
    config: &FutureConfig,
) -> Result<Vec<FuturePoint>, FutureError> {
    config.validate()?;
    let last_date = table.last_date().ok_or(FutureError::EmptyInput)?;
    if last_date
        .checked_add_days(Days::new(config.days_ahead as u64))
        .is_none()
    {
        return Err(FutureError::Config(ConfigError::Invalid(format!(
            "{} days after {last_date} runs past the last representable date",
            config.days_ahead
        ))));
    }

    let model = fit(
        &table.log_closes(),
        &ModelConfig::from_order(config.order),
        None,
        &FitOptions::default(),
    )?;
    let log_prices = model.forecast(config.days_ahead)?;

    let points: Vec<FuturePoint> = last_date
        .iter_days()
        .skip(1)
        .zip(log_prices)
        .map(|(date, log_price)| FuturePoint {
            date,
            predicted_price: log_price.exp(),
            log_predicted_price: log_price,
        })
        .collect();

    info!(
        order = %config.order,
        train_size = model.result().train_size,
        days_ahead = config.days_ahead,
        %last_date,
        "future forecast complete"
    );
    Ok(points)
}
