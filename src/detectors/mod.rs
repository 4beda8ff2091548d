//! Growth-move detection
//!
//! A single forward pass over a daily series. While idle the scanner looks for a
//! confirmed low-of-range (LOD); while a move is open every bar goes through
//! [`update_move`], which tracks the peak, drawdowns and continuations and decides
//! when the move ends. Closed moves go to [`finalize_move`] for classification.
//!
//! # States
//!
//! ```text
//! Idle ──start──> Active ──30% decline──> PendingContinuation ──new high──> Active
//!                   │                            │
//!                   └──LOD / stagnation / max────┴──deadline passed──> Ended
//! ```
//!
//! `Active` is further split into [`MovePhase::Normal`] and [`MovePhase::InDrawdown`].

pub mod finalize;
pub mod helpers;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{params::MoveParams, OHLCV};

pub use finalize::*;
use helpers::{
    add_days, breaks_lod, cooldown_elapsed, days_between, decline_from_peak, in_drawdown_band,
    rise_from_lod,
};

// ============================================================
// MOVE STATE
// ============================================================

/// Sub-state of an open move. Drawdown and continuation tracking never overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovePhase {
    Normal,
    /// Price is 15-30% below the peak
    InDrawdown { start: NaiveDate, low: f64 },
    /// Price fell 30%+ from the peak; waiting for a new high until `deadline`
    PendingContinuation { deadline: NaiveDate, lod: f64 },
}

/// Externally visible status of an open move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStatus {
    Active,
    PendingContinuation,
}

/// A recovered 15-30% pullback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub low_price: f64,
}

/// A 30%+ decline that was later overcome by a new peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    pub old_peak: f64,
    pub continuation_date: NaiveDate,
    pub new_lod: f64,
}

/// Why a move closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    ContinuationFailed,
    LodBroken,
    NoNewHigh,
    MaxDurationExceeded,
    EndOfData,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::ContinuationFailed => "Continuation failed",
            EndReason::LodBroken => "LOD broken",
            EndReason::NoNewHigh => "No new high in 30 days",
            EndReason::MaxDurationExceeded => "Maximum time exceeded",
            EndReason::EndOfData => "End of data",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End conditions, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    /// Suspends the move instead of closing it
    Decline,
    LodBroken,
    NoNewHigh,
    MaxDuration,
}

impl EndCondition {
    /// The close reason, or `None` for the decline that only suspends the move
    pub fn close_reason(self) -> Option<EndReason> {
        match self {
            EndCondition::Decline => None,
            EndCondition::LodBroken => Some(EndReason::LodBroken),
            EndCondition::NoNewHigh => Some(EndReason::NoNewHigh),
            EndCondition::MaxDuration => Some(EndReason::MaxDurationExceeded),
        }
    }
}

/// Outcome of feeding one bar to an open move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Open,
    Closed(EndReason),
}

/// The single live move of a scan
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthMove {
    pub ticker: String,
    pub start_date: NaiveDate,
    /// Floor of the move. Raised by drawdown recovery, reset by continuations.
    pub lod: f64,
    pub peak_price: f64,
    pub peak_date: NaiveDate,
    /// Kept equal to the peak date
    pub end_date: NaiveDate,
    /// Date the closing condition fired
    pub actual_end_date: Option<NaiveDate>,
    pub end_reason: Option<EndReason>,
    /// Bars since the last new peak
    pub days_since_high: usize,
    pub drawdowns: Vec<Drawdown>,
    pub continuations: Vec<Continuation>,
    pub phase: MovePhase,
}

impl GrowthMove {
    #[inline]
    pub fn status(&self) -> MoveStatus {
        match self.phase {
            MovePhase::PendingContinuation { .. } => MoveStatus::PendingContinuation,
            MovePhase::Normal | MovePhase::InDrawdown { .. } => MoveStatus::Active,
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.end_reason.is_some()
    }

    fn close(mut self, date: NaiveDate, reason: EndReason) -> (Self, Step) {
        self.actual_end_date = Some(date);
        self.end_reason = Some(reason);
        debug!(
            ticker = %self.ticker,
            %date,
            reason = reason.as_str(),
            peak_date = %self.peak_date,
            "move ended"
        );
        (self, Step::Closed(reason))
    }

    fn set_peak(&mut self, price: f64, date: NaiveDate) {
        self.peak_price = price;
        self.peak_date = date;
        self.end_date = date;
        self.days_since_high = 0;
    }
}

// ============================================================
// INITIATION
// ============================================================

/// Try to start a move whose LOD is the low of `bars[index]`.
///
/// The confirmation window covers `confirm_window` bars starting at `index` (fewer at the
/// end of the series). Any window bar undercutting the LOD tolerance invalidates the
/// candidate; otherwise the first bar rising `confirm_rise` above the LOD confirms it.
pub fn start_move<T: OHLCV>(
    ticker: &str,
    bars: &[T],
    index: usize,
    params: &MoveParams,
) -> Option<GrowthMove> {
    let candidate = bars.get(index)?;
    let lod = candidate.low();
    if lod <= params.min_lod {
        return None;
    }

    let end = index.saturating_add(params.confirm_window.get()).min(bars.len());
    let window = &bars[index..end];

    if window
        .iter()
        .any(|bar| breaks_lod(bar.low(), lod, params.lod_tolerance.get()))
    {
        return None;
    }

    let confirm = window
        .iter()
        .find(|bar| rise_from_lod(lod, bar.high()) >= params.confirm_rise.get())?;

    trace!(
        ticker,
        start = %candidate.date(),
        lod,
        confirmed = %confirm.date(),
        "growth start confirmed"
    );

    Some(GrowthMove {
        ticker: ticker.to_string(),
        start_date: candidate.date(),
        lod,
        peak_price: confirm.high(),
        peak_date: confirm.date(),
        end_date: confirm.date(),
        actual_end_date: None,
        end_reason: None,
        days_since_high: 0,
        drawdowns: Vec::new(),
        continuations: Vec::new(),
        phase: MovePhase::Normal,
    })
}

// ============================================================
// UPDATE
// ============================================================

/// Advance an open move by one bar.
///
/// Takes the move by value and hands it back with the step outcome; on
/// `Step::Closed` the returned move carries its end reason and actual end date.
pub fn update_move<T: OHLCV>(mut mv: GrowthMove, bar: &T, params: &MoveParams) -> (GrowthMove, Step) {
    let date = bar.date();

    if let MovePhase::PendingContinuation { deadline, lod } = mv.phase {
        if bar.high() > mv.peak_price {
            debug!(
                ticker = %mv.ticker,
                %date,
                old_peak = mv.peak_price,
                new_high = bar.high(),
                "continuation"
            );
            mv.continuations.push(Continuation {
                old_peak: mv.peak_price,
                continuation_date: date,
                new_lod: lod,
            });
            mv.lod = lod;
            mv.set_peak(bar.high(), date);
            mv.phase = MovePhase::Normal;
            return (mv, Step::Open);
        }
        if date > deadline {
            return mv.close(date, EndReason::ContinuationFailed);
        }
        return (mv, Step::Open);
    }

    if bar.high() > mv.peak_price {
        mv.set_peak(bar.high(), date);
    } else {
        mv.days_since_high += 1;
    }

    let condition = check_end_conditions(&mv, bar, params);
    if let Some(reason) = condition.and_then(EndCondition::close_reason) {
        return mv.close(date, reason);
    }

    match condition {
        // Only the decline is left; it suspends rather than closes
        Some(_) => {
            let deadline = add_days(mv.peak_date, params.continuation_window);
            debug!(
                ticker = %mv.ticker,
                %date,
                peak = mv.peak_price,
                low = bar.low(),
                %deadline,
                "decline from peak, waiting for continuation"
            );
            mv.phase = MovePhase::PendingContinuation {
                deadline,
                lod: bar.low(),
            };
            (mv, Step::Open)
        }
        None => {
            track_drawdown(&mut mv, bar, params);
            (mv, Step::Open)
        }
    }
}

/// First matching end condition for `bar`, by priority:
/// decline > LOD break > stagnation > max duration.
pub fn check_end_conditions<T: OHLCV>(
    mv: &GrowthMove,
    bar: &T,
    params: &MoveParams,
) -> Option<EndCondition> {
    if decline_from_peak(mv.peak_price, bar.low()) >= params.end_decline.get() {
        return Some(EndCondition::Decline);
    }
    if breaks_lod(bar.low(), mv.lod, params.lod_tolerance.get()) {
        return Some(EndCondition::LodBroken);
    }
    if mv.days_since_high >= params.stagnation_bars.get() {
        return Some(EndCondition::NoNewHigh);
    }
    if days_between(mv.start_date, bar.date()) >= params.max_duration {
        return Some(EndCondition::MaxDuration);
    }
    None
}

fn track_drawdown<T: OHLCV>(mv: &mut GrowthMove, bar: &T, params: &MoveParams) {
    let decline = decline_from_peak(mv.peak_price, bar.low());
    let in_band = in_drawdown_band(
        decline,
        params.drawdown_decline.get(),
        params.end_decline.get(),
    );

    match mv.phase {
        MovePhase::Normal if in_band => {
            trace!(ticker = %mv.ticker, date = %bar.date(), decline, "drawdown started");
            mv.phase = MovePhase::InDrawdown {
                start: bar.date(),
                low: bar.low(),
            };
        }
        MovePhase::InDrawdown { start, low } if in_band => {
            mv.phase = MovePhase::InDrawdown {
                start,
                low: low.min(bar.low()),
            };
        }
        MovePhase::InDrawdown { start, low } if decline < params.drawdown_decline.get() => {
            debug!(
                ticker = %mv.ticker,
                %start,
                end = %bar.date(),
                old_lod = mv.lod,
                new_lod = low,
                "drawdown recovered"
            );
            mv.drawdowns.push(Drawdown {
                start_date: start,
                end_date: bar.date(),
                low_price: low,
            });
            mv.lod = low;
            mv.phase = MovePhase::Normal;
        }
        _ => {}
    }
}

// ============================================================
// SCAN
// ============================================================

enum ScanState {
    Idle { last_close: Option<usize> },
    Open(GrowthMove),
}

/// Scan a series and return every closed move, qualifying or not.
///
/// A move still open at the end of the series is closed with [`EndReason::EndOfData`]
/// on the last bar's date.
pub fn scan_moves<T: OHLCV>(ticker: &str, bars: &[T], params: &MoveParams) -> Vec<GrowthMove> {
    let mut closed = Vec::new();
    let mut state = ScanState::Idle { last_close: None };

    for (index, bar) in bars.iter().enumerate() {
        state = match state {
            ScanState::Idle { last_close } => {
                if !cooldown_elapsed(last_close, index, params.cooldown_bars.get()) {
                    ScanState::Idle { last_close }
                } else {
                    match start_move(ticker, bars, index, params) {
                        Some(mv) => {
                            debug!(ticker, start = %mv.start_date, lod = mv.lod, "move started");
                            ScanState::Open(mv)
                        }
                        None => ScanState::Idle { last_close },
                    }
                }
            }
            ScanState::Open(mv) => match update_move(mv, bar, params) {
                (mv, Step::Open) => ScanState::Open(mv),
                (mv, Step::Closed(_)) => {
                    closed.push(mv);
                    ScanState::Idle {
                        last_close: Some(index),
                    }
                }
            },
        };
    }

    if let (ScanState::Open(mut mv), Some(last)) = (state, bars.last()) {
        mv.end_date = mv.peak_date;
        let (mv, _) = mv.close(last.date(), EndReason::EndOfData);
        closed.push(mv);
    }

    closed
}

/// Scan a series and return the finalized moves that qualify as growth stocks.
pub fn find_growth_moves<T: OHLCV>(
    ticker: &str,
    bars: &[T],
    params: &MoveParams,
) -> Vec<MoveResult> {
    let results: Vec<MoveResult> = scan_moves(ticker, bars, params)
        .into_iter()
        .filter_map(|mv| finalize_move(mv, params))
        .collect();

    for r in &results {
        info!(
            ticker,
            start = %r.start_date,
            end = %r.end_date,
            gain = r.gain_percent,
            days = r.duration_days.get(),
            superperformer = r.is_superperformer,
            "growth move"
        );
    }
    results
}

// ============================================================
// TESTS
// ============================================================
