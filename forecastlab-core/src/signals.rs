//! Signal Generator — forecast-vs-actual deltas to discrete trading actions.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ForecastRow, PredictionColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    /// The prediction was invalid; no comparison was made.
    NoSignal,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::NoSignal => "NO_SIGNAL",
        })
    }
}

/// Percent-change thresholds. Both bounds are exclusive: a change of exactly
/// `buy_above` is a HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub buy_above: f64,
    pub sell_below: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            buy_above: 1.0,
            sell_below: -1.0,
        }
    }
}

impl SignalThresholds {
    pub fn classify(&self, expected_change_pct: Option<f64>) -> Signal {
        match expected_change_pct {
            Some(pct) if pct.is_finite() => {
                if pct > self.buy_above {
                    Signal::Buy
                } else if pct < self.sell_below {
                    Signal::Sell
                } else {
                    Signal::Hold
                }
            }
            _ => Signal::NoSignal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub date: NaiveDate,
    pub actual_close: f64,
    pub predicted_close: Option<f64>,
    pub expected_change_pct: Option<f64>,
    pub signal: Signal,
}

/// `(predicted - actual) / actual * 100`, or `None` if either side is unusable.
pub fn expected_change_pct(actual: f64, predicted: Option<f64>) -> Option<f64> {
    let predicted = predicted.filter(|p| p.is_finite())?;
    if !actual.is_finite() || actual == 0.0 {
        return None;
    }
    Some((predicted - actual) / actual * 100.0)
}

/// One signal per forecast row, comparing `column` against the row's close.
pub fn trading_signals(
    rows: &[ForecastRow],
    column: PredictionColumn,
    thresholds: &SignalThresholds,
) -> Vec<SignalRecord> {
    rows.iter()
        .map(|row| {
            let predicted = row.prediction(column);
            let pct = expected_change_pct(row.close, predicted);
            SignalRecord {
                date: row.date,
                actual_close: row.close,
                predicted_close: predicted,
                expected_change_pct: pct,
                signal: thresholds.classify(pct),
            }
        })
        .collect()
}

/// Counts per signal, in BUY / SELL / HOLD / NO_SIGNAL order.
pub fn signal_counts(records: &[SignalRecord]) -> [(Signal, usize); 4] {
    let count = |s: Signal| records.iter().filter(|r| r.signal == s).count();
    [
        (Signal::Buy, count(Signal::Buy)),
        (Signal::Sell, count(Signal::Sell)),
        (Signal::Hold, count(Signal::Hold)),
        (Signal::NoSignal, count(Signal::NoSignal)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(close: f64, tomorrow: Option<f64>) -> ForecastRow {
        ForecastRow {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            close,
            pred_today: None,
            pred_tomorrow: tomorrow,
            pred_2_days: None,
        }
    }

    fn signal_for(close: f64, predicted: f64) -> Signal {
        let records = trading_signals(
            &[row(close, Some(predicted))],
            PredictionColumn::Tomorrow,
            &SignalThresholds::default(),
        );
        records[0].signal
    }

    #[test]
    fn thresholds() {
        assert_eq!(signal_for(100.0, 101.5), Signal::Buy);
        assert_eq!(signal_for(100.0, 98.0), Signal::Sell);
        assert_eq!(signal_for(100.0, 100.3), Signal::Hold);
    }

    #[test]
    fn exact_boundary_is_hold() {
        let t = SignalThresholds::default();
        assert_eq!(t.classify(Some(1.0)), Signal::Hold);
        assert_eq!(t.classify(Some(-1.0)), Signal::Hold);
    }

    #[test]
    fn invalid_prediction_is_no_signal() {
        let records = trading_signals(
            &[row(100.0, None), row(100.0, Some(f64::NAN))],
            PredictionColumn::Tomorrow,
            &SignalThresholds::default(),
        );
        for r in &records {
            assert_eq!(r.signal, Signal::NoSignal);
            assert!(r.expected_change_pct.is_none());
        }
    }

    #[test]
    fn column_selection() {
        let mut r = row(100.0, Some(100.0));
        r.pred_2_days = Some(110.0);
        let records = trading_signals(&[r], PredictionColumn::TwoDays, &SignalThresholds::default());
        assert_eq!(records[0].signal, Signal::Buy);
        assert!((records[0].expected_change_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn custom_thresholds() {
        let t = SignalThresholds {
            buy_above: 5.0,
            sell_below: -5.0,
        };
        assert_eq!(t.classify(Some(3.0)), Signal::Hold);
        assert_eq!(t.classify(Some(6.0)), Signal::Buy);
    }

    #[test]
    fn counts() {
        let rows = [row(100.0, Some(102.0)), row(100.0, Some(97.0)), row(100.0, None)];
        let records = trading_signals(&rows, PredictionColumn::Tomorrow, &SignalThresholds::default());
        let counts = signal_counts(&records);
        assert_eq!(counts[0], (Signal::Buy, 1));
        assert_eq!(counts[1], (Signal::Sell, 1));
        assert_eq!(counts[2], (Signal::Hold, 0));
        assert_eq!(counts[3], (Signal::NoSignal, 1));
    }

    #[test]
    fn signal_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Signal::NoSignal).unwrap(), "\"NO_SIGNAL\"");
    }
}
