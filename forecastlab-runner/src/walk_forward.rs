//! Walk-forward forecasting: re-fit at each simulated decision date using
//! only rows dated strictly before it.
//!
//! For each calendar date d in [start, start + horizon] (inclusive):
//! - fewer than `min_history` visible rows: skip d, no record
//! - otherwise fit the target log closes, forecast 3 steps, exponentiate
//! - a failed fit or forecast still yields a record, with every prediction
//!   invalid and the failure kind attached
//!
//! Iterations share nothing but the read-only table, so they run on the rayon
//! pool and are re-sorted by date afterwards.

use std::time::Duration;

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use forecastlab_core::domain::ForecastRow;
use forecastlab_core::features::FeatureTable;
use forecastlab_core::model::{fit, ConfigError, FailureKind, FitFailure, FitOptions, ModelConfig, Order};

/// Forecast steps per decision date: today, tomorrow, two days out.
pub const FORECAST_STEPS: usize = 3;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// First decision date (inclusive).
    pub start_date: NaiveDate,
    /// Days after `start_date` to keep stepping; the window has `horizon_days + 1` dates.
    pub horizon_days: u32,
    pub order: Order,
    /// Minimum visible rows before a date is attempted.
    pub min_history: usize,
    pub parallel: bool,
    /// Wall-clock budget per date, in seconds.
    pub fit_timeout_secs: Option<f64>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2021, 10, 1).unwrap_or_default(),
            horizon_days: 30,
            order: Order::new(2, 1, 2),
            min_history: 10,
            parallel: true,
            fit_timeout_secs: None,
        }
    }
}

impl WalkForwardConfig {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::from_order(self.order)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_history == 0 {
            return Err(ConfigError::Invalid("min_history must be at least 1".into()));
        }
        // The last decision date still needs two representable target dates.
        let span = u64::from(self.horizon_days) + FORECAST_STEPS as u64 - 1;
        if self.start_date.checked_add_days(Days::new(span)).is_none() {
            return Err(ConfigError::Invalid(format!(
                "walk-forward window of {} days from {} runs past the last representable date",
                self.horizon_days, self.start_date
            )));
        }
        self.model_config().validate_for_forecast()
    }

    /// Every decision date in the window, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take(self.horizon_days as usize + 1)
            .collect()
    }

    fn fit_options(&self) -> FitOptions {
        FitOptions {
            timeout: self
                .fit_timeout_secs
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64),
            max_iter: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Predictions made on one decision date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// The decision date d.
    pub date: NaiveDate,
    /// Last feature-row date the fit saw (always before `date`).
    pub as_of_date: NaiveDate,
    /// d, d + 1, d + 2.
    pub target_dates: [NaiveDate; FORECAST_STEPS],
    /// Predicted closes in price units; `None` when the fit or forecast failed.
    pub predicted: [Option<f64>; FORECAST_STEPS],
    pub train_size: usize,
    pub failure: Option<FailureKind>,
    pub failure_reason: Option<String>,
}

impl ForecastRecord {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// Records plus the merged actual-vs-predicted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForward {
    /// One record per attempted date, ascending.
    pub records: Vec<ForecastRecord>,
    /// Every feature row with its same-date predictions (or `None`).
    pub rows: Vec<ForecastRow>,
    /// Dates with too little history (no record emitted).
    pub skipped: usize,
    /// Dates with a record whose predictions are invalid.
    pub failed: usize,
}

impl WalkForward {
    pub fn succeeded(&self) -> usize {
        self.records.len() - self.failed
    }
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no forecast succeeded: {failed} dates failed, {skipped} skipped for insufficient history")]
    NoSuccessfulForecasts { failed: usize, skipped: usize },
}

// ─── Forecasting ─────────────────────────────────────────────────────

/// Forecast for a single decision date, or `None` when the date is skipped.
pub fn forecast_date(
    table: &FeatureTable,
    date: NaiveDate,
    config: &WalkForwardConfig,
) -> Option<ForecastRecord> {
    let visible = table.rows_before(date);
    if visible.len() < config.min_history {
        return None;
    }
    let as_of_date = visible.last()?.date;
    let samples: Vec<f64> = visible.iter().map(|r| r.log_close).collect();

    let target_dates = target_dates(date)?;
    let outcome = fit(&samples, &config.model_config(), None, &config.fit_options())
        .and_then(|model| model.forecast(FORECAST_STEPS));

    let record = match outcome {
        Ok(log_prices) => ForecastRecord {
            date,
            as_of_date,
            target_dates,
            predicted: [0, 1, 2].map(|i| log_prices.get(i).map(|v| v.exp())),
            train_size: samples.len(),
            failure: None,
            failure_reason: None,
        },
        Err(failure) => invalid_record(date, as_of_date, target_dates, samples.len(), &failure),
    };
    Some(record)
}

/// d, d + 1, d + 2; `None` past the last representable date.
fn target_dates(date: NaiveDate) -> Option<[NaiveDate; FORECAST_STEPS]> {
    let mut dates = [date; FORECAST_STEPS];
    for (i, slot) in dates.iter_mut().enumerate() {
        *slot = date.checked_add_days(Days::new(i as u64))?;
    }
    Some(dates)
}

fn invalid_record(
    date: NaiveDate,
    as_of_date: NaiveDate,
    target_dates: [NaiveDate; FORECAST_STEPS],
    train_size: usize,
    failure: &FitFailure,
) -> ForecastRecord {
    warn!(%date, kind = %failure.kind(), %failure, "walk-forward date failed");
    ForecastRecord {
        date,
        as_of_date,
        target_dates,
        predicted: [None; FORECAST_STEPS],
        train_size,
        failure: Some(failure.kind()),
        failure_reason: Some(failure.to_string()),
    }
}

/// Run the walk-forward loop over `table` and merge the predictions back
/// onto every row by date.
pub fn walk_forward_forecast(
    table: &FeatureTable,
    config: &WalkForwardConfig,
) -> Result<WalkForward, WalkForwardError> {
    config.validate()?;

    let dates = config.dates();
    let outcomes: Vec<Option<ForecastRecord>> = if config.parallel {
        dates
            .par_iter()
            .map(|&d| forecast_date(table, d, config))
            .collect()
    } else {
        dates.iter().map(|&d| forecast_date(table, d, config)).collect()
    };

    let skipped = outcomes.iter().filter(|o| o.is_none()).count();
    let mut records: Vec<ForecastRecord> = outcomes.into_iter().flatten().collect();
    records.sort_by_key(|r| r.date);
    let failed = records.iter().filter(|r| !r.is_valid()).count();

    if records.len() == failed {
        return Err(WalkForwardError::NoSuccessfulForecasts { failed, skipped });
    }

    info!(
        order = %config.order,
        dates = dates.len(),
        succeeded = records.len() - failed,
        failed,
        skipped,
        "walk-forward complete"
    );

    let rows = merge_forecasts(table, &records);
    Ok(WalkForward {
        records,
        rows,
        skipped,
        failed,
    })
}

/// Left-join records onto the table by decision date. Rows outside the
/// walk-forward window keep every prediction `None`.
pub fn merge_forecasts(table: &FeatureTable, records: &[ForecastRecord]) -> Vec<ForecastRow> {
    table
        .rows()
        .iter()
        .map(|row| {
            let predicted = records
                .binary_search_by_key(&row.date, |r| r.date)
                .ok()
                .map(|i| records[i].predicted)
                .unwrap_or([None; FORECAST_STEPS]);
            ForecastRow {
                date: row.date,
                close: row.close,
                pred_today: predicted[0],
                pred_tomorrow: predicted[1],
                pred_2_days: predicted[2],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecastlab_core::features::derive;
    use forecastlab_core::synthetic;

    fn table() -> FeatureTable {
        derive(&synthetic::random_walk_series("walk-forward", 260, 100.0, 0.02).unwrap())
    }

    fn config_at(table: &FeatureTable, offset: usize, horizon: u32) -> WalkForwardConfig {
        WalkForwardConfig {
            start_date: table.rows()[offset].date,
            horizon_days: horizon,
            order: Order::new(0, 1, 0),
            parallel: false,
            ..WalkForwardConfig::default()
        }
    }

    #[test]
    fn dates_are_inclusive() {
        let cfg = WalkForwardConfig {
            horizon_days: 4,
            ..WalkForwardConfig::default()
        };
        let dates = cfg.dates();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], cfg.start_date);
        assert_eq!(dates[4], cfg.start_date + chrono::Duration::days(4));
    }

    #[test]
    fn random_walk_predicts_last_visible_close() {
        let t = table();
        let cfg = config_at(&t, 20, 5);
        let wf = walk_forward_forecast(&t, &cfg).unwrap();
        assert_eq!(wf.records.len(), 6);
        assert_eq!(wf.skipped, 0);
        for record in &wf.records {
            let last = t.rows_before(record.date).last().unwrap();
            assert_eq!(record.as_of_date, last.date);
            assert!(record.as_of_date < record.date);
            let expected = last.log_close.exp();
            for p in record.predicted {
                assert!((p.unwrap() - expected).abs() < 1e-9 * expected);
            }
        }
    }

    #[test]
    fn short_history_dates_are_skipped_not_recorded() {
        let t = table();
        // Dates 0..=14: the first 10 have fewer than 10 visible rows.
        let cfg = config_at(&t, 0, 14);
        let wf = walk_forward_forecast(&t, &cfg).unwrap();
        assert_eq!(wf.skipped, 10);
        assert_eq!(wf.records.len(), 5);
        assert_eq!(wf.records[0].date, t.rows()[10].date);
    }

    #[test]
    fn merged_rows_cover_whole_table() {
        let t = table();
        let cfg = config_at(&t, 30, 3);
        let wf = walk_forward_forecast(&t, &cfg).unwrap();
        assert_eq!(wf.rows.len(), t.len());
        let with_predictions = wf.rows.iter().filter(|r| r.pred_today.is_some()).count();
        assert_eq!(with_predictions, 4);
        assert!(wf.rows[0].pred_today.is_none());
        assert_eq!(wf.rows[30].close, t.rows()[30].close);
    }

    #[test]
    fn out_of_range_order_is_rejected_up_front() {
        let mut cfg = WalkForwardConfig::default();
        cfg.order = Order::new(1, 7, 0);
        assert!(matches!(
            walk_forward_forecast(&table(), &cfg),
            Err(WalkForwardError::Config(_))
        ));
    }

    #[test]
    fn window_past_last_date_is_rejected() {
        let cfg = WalkForwardConfig {
            start_date: NaiveDate::MAX - chrono::Duration::days(1),
            horizon_days: 5,
            ..WalkForwardConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            walk_forward_forecast(&table(), &cfg),
            Err(WalkForwardError::Config(ConfigError::Invalid(_)))
        ));
        assert!(cfg.dates().len() <= 2);
    }

    #[test]
    fn failed_dates_keep_a_record() {
        let t = table();
        let mut cfg = config_at(&t, 20, 2);
        cfg.order = Order::new(2, 1, 2);
        cfg.fit_timeout_secs = Some(0.0);
        // Every fit times out: all dates recorded as invalid, none succeed.
        match walk_forward_forecast(&t, &cfg) {
            Err(WalkForwardError::NoSuccessfulForecasts { failed, skipped }) => {
                assert_eq!(failed, 3);
                assert_eq!(skipped, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let record = forecast_date(&t, t.rows()[20].date, &cfg).unwrap();
        assert!(!record.is_valid());
        assert_eq!(record.failure, Some(FailureKind::TimedOut));
        assert_eq!(record.predicted, [None; FORECAST_STEPS]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let t = table();
        let mut cfg = config_at(&t, 15, 10);
        cfg.order = Order::new(1, 1, 0);
        let seq = walk_forward_forecast(&t, &cfg).unwrap();
        cfg.parallel = true;
        let par = walk_forward_forecast(&t, &cfg).unwrap();
        assert_eq!(seq, par);
    }
}
