//! Finalization and classification of closed moves

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    helpers::{days_between, gain_percent},
    Continuation, Drawdown, EndReason, GrowthMove,
};
use crate::{params::MoveParams, CalendarDays};

/// Date style used in summaries and reports, e.g. `Jan 2, 2006`
pub const DISPLAY_DATE: &str = "%b %-d, %Y";

/// Growth classification of a finalized move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Growth,
    Superperformer,
}

impl Classification {
    #[inline]
    pub fn is_superperformer(self) -> bool {
        matches!(self, Classification::Superperformer)
    }
}

/// Classify a move by duration and gain.
///
/// Windows are tried in order, short then long; the first window containing
/// `duration` decides. Returns `None` when the move is not a growth move.
pub fn classify(duration: CalendarDays, gain: f64, params: &MoveParams) -> Option<Classification> {
    let window = [&params.short_window, &params.long_window]
        .into_iter()
        .find(|w| w.contains(duration))?;

    if gain >= window.super_pct {
        Some(Classification::Superperformer)
    } else if gain >= window.growth_pct {
        Some(Classification::Growth)
    } else {
        None
    }
}

/// A closed move that qualified as a growth stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResult {
    pub ticker: String,
    pub start_date: NaiveDate,
    /// Peak date
    pub end_date: NaiveDate,
    pub actual_end_date: NaiveDate,
    pub end_reason: EndReason,
    pub lod: f64,
    pub peak_price: f64,
    pub gain_percent: f64,
    /// Calendar days from start to peak
    pub duration_days: CalendarDays,
    pub is_superperformer: bool,
    pub drawdowns: Vec<Drawdown>,
    pub continuations: Vec<Continuation>,
}

impl MoveResult {
    /// Drawdown start dates, `; `-joined, or `none`
    pub fn drawdown_summary(&self) -> String {
        if self.drawdowns.is_empty() {
            return "none".to_string();
        }
        self.drawdowns
            .iter()
            .map(|d| d.start_date.format(DISPLAY_DATE).to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn continuation_summary(&self) -> &'static str {
        if self.continuations.is_empty() {
            "none"
        } else {
            "Yes"
        }
    }
}

/// Turn a closed move into a result, or `None` if it does not qualify.
///
/// Gain is measured from the move's final LOD, which drawdown recoveries and
/// continuations may have raised above the starting low.
pub fn finalize_move(mv: GrowthMove, params: &MoveParams) -> Option<MoveResult> {
    if !mv.is_closed() {
        trace!(ticker = %mv.ticker, start = %mv.start_date, "open move cannot be finalized");
        return None;
    }
    let (Some(end_reason), Some(actual_end_date)) = (mv.end_reason, mv.actual_end_date) else {
        return None;
    };

    let duration = days_between(mv.start_date, mv.peak_date);
    if duration.get() <= 0 || mv.lod <= 0.0 {
        trace!(ticker = %mv.ticker, start = %mv.start_date, "zero-length move dropped");
        return None;
    }

    let gain = gain_percent(mv.lod, mv.peak_price);
    let class = classify(duration, gain, params)?;

    Some(MoveResult {
        ticker: mv.ticker,
        start_date: mv.start_date,
        end_date: mv.peak_date,
        actual_end_date,
        end_reason,
        lod: mv.lod,
        peak_price: mv.peak_price,
        gain_percent: gain,
        duration_days: duration,
        is_superperformer: class.is_superperformer(),
        drawdowns: mv.drawdowns,
        continuations: mv.continuations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::MovePhase;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn closed_move(lod: f64, peak: f64, peak_day: i64) -> GrowthMove {
        GrowthMove {
            ticker: "TEST".to_string(),
            start_date: day(0),
            lod,
            peak_price: peak,
            peak_date: day(peak_day),
            end_date: day(peak_day),
            actual_end_date: Some(day(peak_day + 30)),
            end_reason: Some(EndReason::NoNewHigh),
            days_since_high: 30,
            drawdowns: Vec::new(),
            continuations: Vec::new(),
            phase: MovePhase::Normal,
        }
    }

    #[test]
    fn test_classify_short_window() {
        let p = MoveParams::default();
        let days = CalendarDays::from_days;
        assert_eq!(classify(days(63), 1000.0, &p), None);
        assert_eq!(classify(days(64), 100.0, &p), Some(Classification::Growth));
        assert_eq!(classify(days(64), 99.9, &p), None);
        assert_eq!(classify(days(200), 300.0, &p), Some(Classification::Superperformer));
    }

    #[test]
    fn test_classify_boundary_uses_short_window() {
        let p = MoveParams::default();
        let days = CalendarDays::from_days;
        assert_eq!(classify(days(252), 100.0, &p), Some(Classification::Growth));
        assert_eq!(classify(days(252), 300.0, &p), Some(Classification::Superperformer));
        assert_eq!(classify(days(253), 100.0, &p), None);
        assert_eq!(classify(days(253), 150.0, &p), Some(Classification::Growth));
        assert_eq!(classify(days(504), 500.0, &p), Some(Classification::Superperformer));
        assert_eq!(classify(days(505), 1000.0, &p), None);
    }

    #[test]
    fn test_finalize_qualifying_move() {
        let result = finalize_move(closed_move(10.0, 20.0, 252), &MoveParams::default()).unwrap();
        assert_eq!(result.gain_percent, 100.0);
        assert_eq!(result.duration_days.get(), 252);
        assert_eq!(result.end_date, day(252));
        assert_eq!(result.actual_end_date, day(282));
        assert!(!result.is_superperformer);
        assert_eq!(result.drawdown_summary(), "none");
        assert_eq!(result.continuation_summary(), "none");
    }

    #[test]
    fn test_finalize_drops_non_growth() {
        let p = MoveParams::default();
        assert!(finalize_move(closed_move(10.0, 20.0, 253), &p).is_none());
        assert!(finalize_move(closed_move(10.0, 50.0, 30), &p).is_none());
        assert!(finalize_move(closed_move(10.0, 20.0, 0), &p).is_none());
    }

    #[test]
    fn test_finalize_requires_closed_move() {
        let mut mv = closed_move(10.0, 50.0, 100);
        assert!(mv.is_closed());
        mv.end_reason = None;
        mv.actual_end_date = None;
        assert!(!mv.is_closed());
        assert!(finalize_move(mv, &MoveParams::default()).is_none());
    }

    #[test]
    fn test_summaries() {
        let mut mv = closed_move(10.0, 50.0, 100);
        mv.drawdowns = vec![
            Drawdown {
                start_date: day(10),
                end_date: day(14),
                low_price: 12.0,
            },
            Drawdown {
                start_date: day(40),
                end_date: day(45),
                low_price: 20.0,
            },
        ];
        mv.continuations.push(Continuation {
            old_peak: 40.0,
            continuation_date: day(80),
            new_lod: 10.0,
        });
        let result = finalize_move(mv, &MoveParams::default()).unwrap();
        assert!(result.is_superperformer);
        assert_eq!(result.drawdown_summary(), "Jan 11, 2020; Feb 10, 2020");
        assert_eq!(result.continuation_summary(), "Yes");
    }
}
