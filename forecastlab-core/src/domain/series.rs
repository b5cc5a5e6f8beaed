//! PriceSeries — validated, strictly increasing sequence of daily bars.
//!
//! Every operation in the crate consumes a `PriceSeries` rather than a raw
//! `Vec<PriceBar>`, so ordering and uniqueness are checked exactly once, before
//! any feature derivation or fitting begins.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bar::{PriceBar, Tick};

/// Input validation failures. Fatal to the calling operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("price series is empty")]
    Empty,

    #[error("timestamps not strictly increasing at index {index}: {previous} then {current}")]
    Unsorted {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("duplicate timestamp {date} at index {index}")]
    DuplicateTimestamp { index: usize, date: NaiveDate },

    #[error("invalid bar on {date}: prices must be finite and > 0, volume finite and >= 0")]
    InvalidBar { date: NaiveDate },

    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

/// Parse a caller-supplied window boundary in ISO `YYYY-MM-DD` form.
pub fn parse_date(input: &str) -> Result<NaiveDate, SeriesError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| SeriesError::InvalidDate {
        input: input.to_string(),
    })
}

/// Serialized as a plain array of bars; deserialization goes through
/// [`PriceSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriceBar>", into = "Vec<PriceBar>")]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl TryFrom<Vec<PriceBar>> for PriceSeries {
    type Error = SeriesError;

    fn try_from(bars: Vec<PriceBar>) -> Result<Self, Self::Error> {
        Self::new(bars)
    }
}

impl From<PriceSeries> for Vec<PriceBar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}

impl PriceSeries {
    /// Build a series from bars that are already in canonical order.
    ///
    /// Rejects empty input, non-increasing or duplicate timestamps, and bars
    /// whose prices cannot be log-transformed.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InvalidBar { date: bar.date });
            }
            if i > 0 {
                let previous = bars[i - 1].date;
                if bar.date == previous {
                    return Err(SeriesError::DuplicateTimestamp {
                        index: i,
                        date: bar.date,
                    });
                }
                if bar.date < previous {
                    return Err(SeriesError::Unsorted {
                        index: i,
                        previous,
                        current: bar.date,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    /// Canonicalize then validate: stable sort by date, keep the first
    /// occurrence of each date.
    pub fn from_unsorted(mut bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Deterministic BLAKE3 hash over every bar value.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for bar in &self.bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn summary(&self) -> SeriesSummary {
        let closes = self.closes();
        let n = closes.len() as f64;
        let mean = closes.iter().sum::<f64>() / n;
        let std = if closes.len() > 1 {
            let ss: f64 = closes.iter().map(|c| (c - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };
        SeriesSummary {
            total_records: self.bars.len(),
            start: self.first_date(),
            end: self.last_date(),
            close_min: closes.iter().copied().fold(f64::INFINITY, f64::min),
            close_max: closes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            close_mean: mean,
            close_std: std,
        }
    }
}

/// Record count, date range and close statistics of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub total_records: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub close_min: f64,
    pub close_max: f64,
    pub close_mean: f64,
    /// Sample standard deviation (n - 1). NaN for a single bar.
    pub close_std: f64,
}

/// Aggregate intraday ticks into daily bars: first open, last close, summed volume.
///
/// Ticks need not be sorted; within a day they are ordered by timestamp.
pub fn resample_daily(ticks: &[Tick]) -> Result<PriceSeries, SeriesError> {
    let mut days: BTreeMap<NaiveDate, Vec<&Tick>> = BTreeMap::new();
    for tick in ticks {
        days.entry(tick.timestamp.date()).or_default().push(tick);
    }

    let bars = days
        .into_iter()
        .map(|(date, mut day)| {
            day.sort_by_key(|t| t.timestamp);
            let open = day[0].open;
            let close = day[day.len() - 1].close;
            let volume = day.iter().map(|t| t.volume).sum();
            PriceBar::new(date, open, close, volume)
        })
        .collect();

    PriceSeries::new(bars)
}
