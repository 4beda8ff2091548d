//! Common helper functions for growth-move detection
//!
//! Default thresholds and the price/date predicates shared by the state machine,
//! the end-condition check and the finalizer.

use chrono::NaiveDate;

use crate::CalendarDays;

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Candidate LODs at or below this are treated as data artifacts
pub const MIN_LOD: f64 = 0.001;
/// Low must stay above `lod * LOD_TOLERANCE` (0.5% slack)
pub const LOD_TOLERANCE: f64 = 0.995;
/// Bars scanned for confirmation, including the candidate bar
pub const CONFIRM_WINDOW_BARS: usize = 5;
/// Rise from LOD required to confirm a move
pub const CONFIRM_RISE: f64 = 0.05;
/// Decline from peak that suspends the move pending continuation
pub const END_DECLINE: f64 = 0.30;
/// Decline from peak that opens a drawdown (upper bound is END_DECLINE)
pub const DRAWDOWN_DECLINE: f64 = 0.15;
/// Consecutive bars without a new high that end the move
pub const STAGNATION_BARS: usize = 30;
/// Calendar days from start after which the move is closed
pub const MAX_DURATION_DAYS: i64 = 504;
/// Calendar days after the peak in which a continuation must print a new high
pub const CONTINUATION_DAYS: i64 = 90;
/// Bars that must elapse after a close before a new move may start
pub const COOLDOWN_BARS: usize = 30;

/// Short-term window: 64..=252 days
pub const SHORT_MIN_DAYS: i64 = 64;
pub const SHORT_MAX_DAYS: i64 = 252;
pub const SHORT_GROWTH_PCT: f64 = 100.0;
pub const SHORT_SUPER_PCT: f64 = 300.0;

/// Long-term window: (252, 504] days
pub const LONG_MAX_DAYS: i64 = 504;
pub const LONG_GROWTH_PCT: f64 = 150.0;
pub const LONG_SUPER_PCT: f64 = 500.0;

// ============================================================
// PRICE PREDICATES
// ============================================================

/// Fractional decline of `low` from `peak`. Zero when peak is not positive.
#[inline]
pub fn decline_from_peak(peak: f64, low: f64) -> f64 {
    if peak <= 0.0 {
        return 0.0;
    }
    (peak - low) / peak
}

/// Fractional rise of `high` above `lod`. Zero when lod is not positive.
#[inline]
pub fn rise_from_lod(lod: f64, high: f64) -> f64 {
    if lod <= 0.0 {
        return 0.0;
    }
    (high - lod) / lod
}

/// True if `low` undercuts `lod` by more than the tolerance allows
#[inline]
pub fn breaks_lod(low: f64, lod: f64, tolerance: f64) -> bool {
    low < lod * tolerance
}

/// True if the decline sits in the drawdown band `[lower, upper)`
#[inline]
pub fn in_drawdown_band(decline: f64, lower: f64, upper: f64) -> bool {
    decline >= lower && decline < upper
}

/// Gain from `lod` to `peak` in percent
#[inline]
pub fn gain_percent(lod: f64, peak: f64) -> f64 {
    (peak - lod) / lod * 100.0
}

// ============================================================
// DATE HELPERS
// ============================================================

/// Calendar days from `from` to `to` (negative if `to` is earlier)
#[inline]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> CalendarDays {
    CalendarDays::from_days((to - from).num_days())
}

/// `date` shifted forward by `days` calendar days, saturating at the max date
#[inline]
pub fn add_days(date: NaiveDate, days: CalendarDays) -> NaiveDate {
    date.checked_add_signed(chrono::Duration::days(days.get()))
        .unwrap_or(NaiveDate::MAX)
}

/// True once at least `cooldown` bars separate `index` from the last close
#[inline]
pub fn cooldown_elapsed(last_close: Option<usize>, index: usize, cooldown: usize) -> bool {
    match last_close {
        Some(closed_at) => index.saturating_sub(closed_at) >= cooldown,
        None => true,
    }
}
