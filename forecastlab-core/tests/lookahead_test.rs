//! Look-ahead contamination tests for the feature pipeline.
//!
//! Invariant: no feature value at date t may depend on a bar dated t or later,
//! other than the same-day open and the close-derived target columns.
//!
//! Method: derive on a truncated series and on the full series and assert the
//! shared prefix is bit-identical; then perturb one bar and check that no
//! earlier row moves.

use forecastlab_core::domain::{PriceBar, PriceSeries};
use forecastlab_core::features::{derive, FeatureColumn, FIRST_VALID_INDEX};
use forecastlab_core::synthetic;

fn series(n: usize) -> PriceSeries {
    synthetic::random_walk_series("lookahead", n, 250.0, 0.03).unwrap()
}

#[test]
fn truncated_prefix_is_identical() {
    let full = series(400);
    let truncated = PriceSeries::new(full.bars()[..300].to_vec()).unwrap();

    let full_table = derive(&full);
    let truncated_table = derive(&truncated);

    assert_eq!(truncated_table.len(), 300 - FIRST_VALID_INDEX);
    for (t, f) in truncated_table.rows().iter().zip(full_table.rows()) {
        assert_eq!(t, f, "row {} differs between truncated and full", t.date);
    }
}

#[test]
fn perturbing_a_bar_leaves_earlier_rows_untouched() {
    let base = series(320);
    let k = 280;
    let mut bars: Vec<PriceBar> = base.bars().to_vec();
    bars[k].close *= 1.5;
    bars[k].volume *= 3.0;
    let perturbed = PriceSeries::new(bars).unwrap();

    let a = derive(&base);
    let b = derive(&perturbed);
    let cutoff = base.bars()[k].date;

    for (ra, rb) in a.rows().iter().zip(b.rows()) {
        if ra.date < cutoff {
            assert_eq!(ra, rb, "row {} changed after perturbing {}", ra.date, cutoff);
        } else if ra.date == cutoff {
            // Only the same-day target columns may see the perturbed close.
            for column in FeatureColumn::all() {
                if column.is_target_derived() {
                    continue;
                }
                assert_eq!(
                    column.value(ra),
                    column.value(rb),
                    "{column} changed on the perturbed date"
                );
            }
            assert_ne!(ra.log_close, rb.log_close);
        }
    }
}

#[test]
fn perturbed_open_only_moves_same_day_open() {
    let base = series(260);
    let k = 240;
    let mut bars: Vec<PriceBar> = base.bars().to_vec();
    bars[k].open *= 1.1;
    let perturbed = PriceSeries::new(bars).unwrap();

    let a = derive(&base);
    let b = derive(&perturbed);
    let cutoff = base.bars()[k].date;

    for (ra, rb) in a.rows().iter().zip(b.rows()) {
        if ra.date <= cutoff {
            for column in FeatureColumn::all() {
                if matches!(column, FeatureColumn::Open | FeatureColumn::LogOpen) {
                    continue;
                }
                assert_eq!(column.value(ra), column.value(rb));
            }
        }
    }
}
