//! ForecastRow — actual close alongside walk-forward predictions for one date.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the merged forecast table.
///
/// `None` marks an invalid prediction: either the date lies outside the
/// walk-forward window or the fit for that date failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub close: f64,
    pub pred_today: Option<f64>,
    pub pred_tomorrow: Option<f64>,
    pub pred_2_days: Option<f64>,
}

impl ForecastRow {
    pub fn prediction(&self, column: PredictionColumn) -> Option<f64> {
        match column {
            PredictionColumn::Today => self.pred_today,
            PredictionColumn::Tomorrow => self.pred_tomorrow,
            PredictionColumn::TwoDays => self.pred_2_days,
        }
    }
}

/// Which of the three forecast steps to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionColumn {
    #[serde(rename = "pred_today")]
    Today,
    #[serde(rename = "pred_tomorrow")]
    Tomorrow,
    #[serde(rename = "pred_2_days")]
    TwoDays,
}

impl PredictionColumn {
    pub const ALL: [PredictionColumn; 3] = [Self::Today, Self::Tomorrow, Self::TwoDays];

    pub fn name(self) -> &'static str {
        match self {
            Self::Today => "pred_today",
            Self::Tomorrow => "pred_tomorrow",
            Self::TwoDays => "pred_2_days",
        }
    }

    /// Zero-based forecast step this column reads.
    pub fn step(self) -> usize {
        match self {
            Self::Today => 0,
            Self::Tomorrow => 1,
            Self::TwoDays => 2,
        }
    }
}

impl fmt::Display for PredictionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PredictionColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown prediction column '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_roundtrip() {
        for column in PredictionColumn::ALL {
            assert_eq!(column.name().parse::<PredictionColumn>().unwrap(), column);
        }
        assert!("pred_next_week".parse::<PredictionColumn>().is_err());
    }

    #[test]
    fn prediction_reads_matching_step() {
        let row = ForecastRow {
            date: NaiveDate::from_ymd_opt(2021, 10, 1).unwrap(),
            close: 100.0,
            pred_today: Some(1.0),
            pred_tomorrow: Some(2.0),
            pred_2_days: None,
        };
        assert_eq!(row.prediction(PredictionColumn::Tomorrow), Some(2.0));
        assert_eq!(row.prediction(PredictionColumn::TwoDays), None);
    }

    #[test]
    fn serde_uses_column_names() {
        let json = serde_json::to_string(&PredictionColumn::TwoDays).unwrap();
        assert_eq!(json, "\"pred_2_days\"");
    }
}
