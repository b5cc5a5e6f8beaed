//! Feature pipeline — leakage-free engineered columns from a daily price series.
//!
//! Every derived value at date *t* is computed from bars strictly before *t*.
//! The only same-day inputs are the open (known at the start of the day) and
//! the close-derived target columns (`log_close`, `close`), which are never
//! fed into any other feature.

pub mod columns;
pub mod importance;
pub mod rolling;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{PriceSeries, SeriesError};
use crate::model::ExogenousMatrix;

pub use columns::{FeatureColumn, CLOSE_LAGS, PRICE_WINDOWS, VOLUME_WINDOWS};
pub use importance::{feature_importance, FeatureImportance};

use rolling::{rolling_mean, rolling_std, shift, sub};

/// One modeling-ready row per surviving price bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    /// Previous day's volume.
    pub volume: f64,
    pub log_open: f64,
    pub log_close: f64,
    /// log(close[t-1] / close[t-2]).
    pub log_return: f64,
    /// `close_prior[k]` = log close `k + 1` days earlier.
    pub close_prior: [f64; CLOSE_LAGS],
    pub sma: [f64; 4],
    pub dist_sma: [f64; 4],
    pub momentum: [f64; 4],
    pub volatility: [f64; 4],
    pub volume_ma: [f64; 4],
}

impl FeatureRow {
    /// A row with every numeric field NaN.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            open: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
            log_open: f64::NAN,
            log_close: f64::NAN,
            log_return: f64::NAN,
            close_prior: [f64::NAN; CLOSE_LAGS],
            sma: [f64::NAN; 4],
            dist_sma: [f64::NAN; 4],
            momentum: [f64::NAN; 4],
            volatility: [f64::NAN; 4],
            volume_ma: [f64::NAN; 4],
        }
    }

    /// True once every window is satisfied.
    pub fn is_complete(&self) -> bool {
        FeatureColumn::all()
            .into_iter()
            .all(|c| c.value(self).is_some_and(|v| !v.is_nan()))
    }
}

/// Ordered-by-date feature rows. Read-only once derived.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Wrap rows that must already be strictly increasing by date.
    pub fn from_rows(rows: Vec<FeatureRow>) -> Result<Self, SeriesError> {
        for i in 1..rows.len() {
            let previous = rows[i - 1].date;
            let current = rows[i].date;
            if current == previous {
                return Err(SeriesError::DuplicateTimestamp { index: i, date: current });
            }
            if current < previous {
                return Err(SeriesError::Unsorted { index: i, previous, current });
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// Modeling target: log close per row.
    pub fn log_closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.log_close).collect()
    }

    /// Values of one logical column, or `None` for a column the pipeline does not produce.
    pub fn column(&self, column: FeatureColumn) -> Option<Vec<f64>> {
        self.rows.iter().map(|r| column.value(r)).collect()
    }

    /// Number of rows dated strictly before `date`.
    pub fn count_before(&self, date: NaiveDate) -> usize {
        self.rows.partition_point(|r| r.date < date)
    }

    /// Rows dated strictly before `date`: the only rows visible to a
    /// decision made on `date`.
    pub fn rows_before(&self, date: NaiveDate) -> &[FeatureRow] {
        &self.rows[..self.count_before(date)]
    }

    /// Rows dated on or before `end`.
    pub fn until(&self, end: NaiveDate) -> FeatureTable {
        let n = self.rows.partition_point(|r| r.date <= end);
        Self { rows: self.rows[..n].to_vec() }
    }

    /// Rows dated on or after `start`.
    pub fn from_date(&self, start: NaiveDate) -> FeatureTable {
        let n = self.rows.partition_point(|r| r.date < start);
        Self { rows: self.rows[n..].to_vec() }
    }

    /// Row-aligned matrix of every exogenous column.
    pub fn exogenous_matrix(&self) -> ExogenousMatrix {
        exogenous_matrix_for(&self.rows)
    }
}

/// Row-aligned exogenous matrix for an arbitrary slice of rows.
pub fn exogenous_matrix_for(rows: &[FeatureRow]) -> ExogenousMatrix {
    let columns = FeatureColumn::exogenous();
    let names = columns.iter().map(|c| c.name()).collect();
    let values = columns
        .iter()
        .map(|c| rows.iter().map(|r| c.value(r).unwrap_or(f64::NAN)).collect())
        .collect();
    ExogenousMatrix::new(names, values)
}

/// Derive the feature table from a validated price series.
///
/// Rows with any undefined value (insufficient history for a lag or window)
/// are dropped, so the table starts once the longest window over
/// one-period-shifted returns is satisfied.
pub fn derive(series: &PriceSeries) -> FeatureTable {
    let bars = series.bars();
    let n = bars.len();

    let open: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let log_open: Vec<f64> = open.iter().map(|v| v.ln()).collect();
    let log_close: Vec<f64> = close.iter().map(|v| v.ln()).collect();

    // One-step log return, then delayed so day t sees only the t-1 return.
    let mut raw_return = vec![f64::NAN; n];
    for i in 1..n {
        raw_return[i] = (close[i] / close[i - 1]).ln();
    }
    let log_return = shift(&raw_return, 1);

    let close_prior: Vec<Vec<f64>> = (1..=CLOSE_LAGS).map(|k| shift(&log_close, k)).collect();

    let sma_unshifted: Vec<Vec<f64>> = PRICE_WINDOWS.iter().map(|&w| rolling_mean(&close, w)).collect();
    let sma: Vec<Vec<f64>> = sma_unshifted.iter().map(|s| shift(s, 1)).collect();
    // Distance of the close from the (already shifted) SMA, delayed once more.
    let dist_sma: Vec<Vec<f64>> = sma.iter().map(|s| shift(&sub(&close, s), 1)).collect();
    let momentum: Vec<Vec<f64>> = PRICE_WINDOWS
        .iter()
        .map(|&w| shift(&rolling_mean(&log_return, w), 1))
        .collect();
    let volatility: Vec<Vec<f64>> = PRICE_WINDOWS
        .iter()
        .map(|&w| shift(&rolling_std(&log_return, w), 1))
        .collect();
    let volume_ma: Vec<Vec<f64>> = VOLUME_WINDOWS
        .iter()
        .map(|&w| shift(&rolling_mean(&volume, w), 1))
        .collect();
    let volume_prev = shift(&volume, 1);

    fn pick4(cols: &[Vec<f64>], i: usize) -> [f64; 4] {
        [cols[0][i], cols[1][i], cols[2][i], cols[3][i]]
    }

    let rows = (0..n)
        .map(|i| {
            let mut prior = [f64::NAN; CLOSE_LAGS];
            for (k, lagged) in close_prior.iter().enumerate() {
                prior[k] = lagged[i];
            }
            FeatureRow {
                date: bars[i].date,
                open: open[i],
                close: close[i],
                volume: volume_prev[i],
                log_open: log_open[i],
                log_close: log_close[i],
                log_return: log_return[i],
                close_prior: prior,
                sma: pick4(&sma, i),
                dist_sma: pick4(&dist_sma, i),
                momentum: pick4(&momentum, i),
                volatility: pick4(&volatility, i),
                volume_ma: pick4(&volume_ma, i),
            }
        })
        .filter(FeatureRow::is_complete)
        .collect();

    FeatureTable { rows }
}

/// Index of the first bar that survives `derive` (the 200-period
/// momentum/volatility windows over returns delayed by two bars in total).
pub const FIRST_VALID_INDEX: usize = 202;
