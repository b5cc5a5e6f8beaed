//! PriceBar — one trading day of open/close/volume.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily price bar for a single asset.
///
/// Only the fields the feature pipeline consumes are kept: the open (known at
/// the start of the day), the close and the traded volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            close,
            volume,
        }
    }

    /// Returns true if any numeric field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !self.open.is_finite() || !self.close.is_finite() || !self.volume.is_finite()
    }

    /// Prices must be strictly positive (they are log-transformed) and volume non-negative.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.open > 0.0 && self.close > 0.0 && self.volume >= 0.0
    }
}

/// Intraday observation, aggregated into a `PriceBar` by `resample_daily`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: chrono::NaiveDateTime,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}
