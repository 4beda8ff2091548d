//! Property tests for growth-move invariants.
//!
//! Uses proptest over random daily walks (with weekend-style date gaps) to verify:
//! 1. Peak never precedes start; finalized end date is the peak date
//! 2. Duration is the calendar span start..peak and always positive
//! 3. Gain is measured from the final LOD
//! 4. Detection is deterministic
//! 5. Moves never overlap and respect the close cooldown

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use sp_screener::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// (close return, upper wick, lower wick, calendar gap to next bar)
fn arb_day() -> impl Strategy<Value = (f64, f64, f64, i64)> {
    (-0.06..0.08_f64, 0.0..0.03_f64, 0.0..0.03_f64, 1i64..4)
}

fn arb_series() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_day(), 120..400).prop_map(|days| {
        let mut date = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
        let mut close = 10.0;
        let mut bars = Vec::with_capacity(days.len());
        for (ret, up, down, gap) in days {
            let open = close;
            close = (close * (1.0 + ret)).max(0.05);
            let high = open.max(close) * (1.0 + up);
            let low = open.min(close) * (1.0 - down);
            bars.push(Bar::new(date, open, high, low, close, 400_000.0));
            date += chrono::Duration::days(gap);
        }
        bars
    })
}

fn index_by_date(bars: &[Bar]) -> HashMap<NaiveDate, usize> {
    bars.iter().enumerate().map(|(i, b)| (b.date, i)).collect()
}

// ── 1-3. Move shape ─────────────────────────────────────────────────

proptest! {
    /// Closed moves peak on or after their start and report the peak as their end.
    #[test]
    fn peak_follows_start(bars in arb_series()) {
        let params = MoveParams::default();
        for mv in scan_moves("PROP", &bars, &params) {
            prop_assert!(mv.peak_date >= mv.start_date);
            prop_assert_eq!(mv.end_date, mv.peak_date);
            prop_assert!(mv.end_reason.is_some());
            let actual = mv.actual_end_date.unwrap();
            prop_assert!(actual >= mv.peak_date);
            for dd in &mv.drawdowns {
                prop_assert!(dd.start_date <= dd.end_date);
                prop_assert!(dd.start_date > mv.start_date && dd.end_date <= actual);
            }
        }
    }

    /// Finalized duration is the positive calendar span and gain uses the final LOD.
    #[test]
    fn finalized_duration_and_gain(bars in arb_series()) {
        let params = MoveParams::default();
        for r in find_growth_moves("PROP", &bars, &params) {
            let span = (r.end_date - r.start_date).num_days();
            prop_assert_eq!(r.duration_days.get(), span);
            prop_assert!(span > 0);
            let expected = (r.peak_price - r.lod) / r.lod * 100.0;
            prop_assert!((r.gain_percent - expected).abs() < 1e-9);
            prop_assert!(classify(r.duration_days, r.gain_percent, &params).is_some());
        }
    }
}

// ── 4. Determinism ──────────────────────────────────────────────────

proptest! {
    /// Re-running detection on the same series gives identical results.
    #[test]
    fn detection_is_idempotent(bars in arb_series()) {
        let params = MoveParams::default();
        prop_assert_eq!(scan_moves("PROP", &bars, &params), scan_moves("PROP", &bars, &params));
        prop_assert_eq!(
            find_growth_moves("PROP", &bars, &params),
            find_growth_moves("PROP", &bars, &params)
        );
    }
}

// ── 5. Non-overlap ──────────────────────────────────────────────────

proptest! {
    /// Each move starts at least the cooldown number of bars after the previous close.
    #[test]
    fn moves_do_not_overlap(bars in arb_series()) {
        let params = MoveParams::default();
        let index = index_by_date(&bars);
        let moves = scan_moves("PROP", &bars, &params);

        for pair in moves.windows(2) {
            let closed_at = index[&pair[0].actual_end_date.unwrap()];
            let next_start = index[&pair[1].start_date];
            prop_assert!(next_start >= closed_at + params.cooldown_bars.get());
        }
        for mv in moves.iter().rev().skip(1) {
            prop_assert_ne!(mv.end_reason, Some(EndReason::EndOfData));
        }
    }
}
