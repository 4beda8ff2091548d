//! # sp-screener - Superperformance growth-move screener
//!
//! Scans daily OHLCV series for explosive growth moves, tracks their drawdowns and
//! continuations, and classifies each closed move as a growth stock or superperformer.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use sp_screener::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let bars: Vec<Bar> = (0..150)
//!     .map(|i| {
//!         let date = start + chrono::Duration::days(i);
//!         Bar::new(date, 10.0, 10.2, 9.9, 10.0, 500_000.0)
//!     })
//!     .collect();
//!
//! let screener = ScreenerBuilder::new().build().unwrap();
//!
//! // Flat series: passes the gates, finds nothing
//! let moves = screener.analyze("FLAT", &bars).unwrap();
//! assert!(moves.is_empty());
//! ```

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod detectors;
pub mod gate;
pub mod loader;
pub mod params;
pub mod report;

pub mod prelude {
    pub use crate::{
        // Detector
        detectors::{
            classify, finalize_move, find_growth_moves, scan_moves, start_move, update_move,
            Classification, Continuation, Drawdown, EndCondition, EndReason, GrowthMove,
            MovePhase, MoveResult, MoveStatus, Step,
        },
        // Gate
        gate::{average_volume, check_volume},
        // Loader
        loader::{load_symbols, sanitize_bars, BarSource, CsvBarSource, LoadError},
        // Parameters
        params::{ClassWindow, GateParams, MoveParams, ParamMeta, Parameterized, ScreenerConfig},
        // Parallel
        scan_parallel,
        // Types
        Bar,
        CalendarDays,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        // Errors
        ScreenError,
        // Engine
        Screener,
        ScreenerBuilder,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ScreenError>;

/// Errors that can occur while screening a symbol
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("No valid bars after filtering")]
    NoValidBars,

    #[error("No volume data in the last {window} bars")]
    NoVolumeData { window: usize },

    #[error("Average volume {average:.0} below required {floor:.0}")]
    VolumeTooLow { average: f64, floor: f64 },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Failed to load bars: {0}")]
    Load(#[from] loader::LoadError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ScreenError {
    /// True for data-insufficiency rejections: the symbol should be skipped, not retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ScreenError::InsufficientData { .. }
                | ScreenError::NoValidBars
                | ScreenError::NoVolumeData { .. }
                | ScreenError::VolumeTooLow { .. }
        )
    }

    /// True if the symbol failed the volume gate
    pub fn is_volume_failure(&self) -> bool {
        matches!(
            self,
            ScreenError::NoVolumeData { .. } | ScreenError::VolumeTooLow { .. }
        )
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ScreenError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ScreenError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar count (must be > 0). Counts bars, never calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ScreenError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

/// Span in calendar days. Weekends and holidays count; use [`Period`] for bar counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDays(i64);

impl CalendarDays {
    /// Create a configured span, validating value is > 0
    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(ScreenError::InvalidValue("CalendarDays must be > 0"));
        }
        Ok(Self(value))
    }

    /// Measured span between two dates; may be zero or negative
    #[inline]
    pub const fn from_days(value: i64) -> Self {
        Self(value)
    }

    #[doc(hidden)]
    pub const fn new_const(value: i64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CalendarDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CalendarDays {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for CalendarDays {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = i64::deserialize(d)?;
        CalendarDays::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core daily bar trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
    fn date(&self) -> NaiveDate;
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn date(&self) -> NaiveDate {
        (**self).date()
    }
}

/// Extension trait with data-quality checks for daily bars
pub trait OHLCVExt: OHLCV {
    /// Validate a single bar: finite, positive prices, non-negative volume
    fn validate(&self) -> std::result::Result<(), &'static str> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) || self.volume().is_nan() {
            return Err("NaN in OHLCV");
        }
        if prices.iter().any(|p| p.is_infinite()) || self.volume().is_infinite() {
            return Err("Infinite value in OHLCV");
        }
        if self.high() <= 0.0 || self.low() <= 0.0 || self.close() <= 0.0 {
            return Err("non-positive price");
        }
        if self.open() <= 0.0 {
            return Err("non-positive open");
        }
        if self.volume() < 0.0 {
            return Err("negative volume");
        }
        if self.high() < self.low() {
            return Err("high < low");
        }
        Ok(())
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// One trading day for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

// ============================================================
// SCREENER ENGINE
// ============================================================

/// Per-symbol pipeline: length check, volume gate, detection, finalization
#[derive(Debug, Clone)]
pub struct Screener {
    config: params::ScreenerConfig,
    validate_data: bool,
}

impl Screener {
    pub fn new(config: params::ScreenerConfig) -> Self {
        Self {
            config,
            validate_data: true,
        }
    }

    #[inline]
    pub fn config(&self) -> &params::ScreenerConfig {
        &self.config
    }

    /// Run the full pipeline for one symbol.
    ///
    /// Short series and illiquid symbols are rejected with a typed error; a symbol that
    /// passes but has no qualifying move returns an empty list.
    pub fn analyze<T: OHLCV>(&self, ticker: &str, bars: &[T]) -> Result<Vec<detectors::MoveResult>> {
        let need = self.config.min_bars.get();
        if bars.len() < need {
            return Err(ScreenError::InsufficientData {
                need,
                got: bars.len(),
            });
        }
        if self.validate_data {
            self.validate_bars(bars)?;
        }

        let average = gate::check_volume(bars, &self.config.gate)?;
        debug!(ticker, average, "volume gate passed");

        let results = self.detect(ticker, bars);
        info!(ticker, moves = results.len(), "analysis complete");
        Ok(results)
    }

    /// Detection and finalization only, without the length and volume gates.
    pub fn detect<T: OHLCV>(&self, ticker: &str, bars: &[T]) -> Vec<detectors::MoveResult> {
        detectors::find_growth_moves(ticker, bars, &self.config.moves)
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (index, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|reason| ScreenError::InvalidBar { index, reason })?;
            if index > 0 && bar.date() <= bars[index - 1].date() {
                return Err(ScreenError::InvalidBar {
                    index,
                    reason: "dates not strictly ascending",
                });
            }
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Screener instances
#[derive(Debug, Clone)]
pub struct ScreenerBuilder {
    config: params::ScreenerConfig,
    validate_data: bool,
}

impl Default for ScreenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenerBuilder {
    pub fn new() -> Self {
        Self {
            config: params::ScreenerConfig::default(),
            validate_data: true,
        }
    }

    /// Start from a full configuration
    pub fn config(mut self, config: params::ScreenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the move-detection thresholds
    pub fn move_params(mut self, params: params::MoveParams) -> Self {
        self.config.moves = params;
        self
    }

    /// Replace the volume gate
    pub fn gate(mut self, gate: params::GateParams) -> Self {
        self.config.gate = gate;
        self
    }

    /// Minimum series length
    pub fn min_bars(mut self, bars: usize) -> Result<Self> {
        self.config.min_bars = Period::new(bars)?;
        Ok(self)
    }

    /// Size of the permit pool used by [`scan_parallel`]
    pub fn max_concurrent(mut self, permits: usize) -> Result<Self> {
        self.config.max_concurrent = Period::new(permits)?;
        Ok(self)
    }

    /// Enable/disable per-bar validation before detection
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the screener
    pub fn build(self) -> Result<Screener> {
        self.config.moves.validate()?;
        self.config.gate.validate()?;
        if self.config.min_bars.get() < self.config.gate.window.get() {
            return Err(ScreenError::InvalidConfig(
                "min_bars must cover the volume window".to_string(),
            ));
        }
        Ok(Screener {
            config: self.config,
            validate_data: self.validate_data,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

/// Result of scanning a single symbol
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub moves: Vec<detectors::MoveResult>,
}

/// Error from scanning a single symbol
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: ScreenError,
}

/// Load and analyze many symbols in parallel.
///
/// At most `max_concurrent` symbols are in flight at once: work runs on a dedicated pool
/// of that many workers, so a symbol waits for a free worker before its load starts.
/// One symbol's failure never affects the others. Both lists come back sorted by symbol.
pub fn scan_parallel<S>(
    screener: &Screener,
    source: &S,
    symbols: &[String],
) -> Result<(Vec<ScanResult>, Vec<ScanError>)>
where
    S: loader::BarSource + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(screener.config.max_concurrent.get())
        .thread_name(|i| format!("sp-scan-{i}"))
        .build()?;

    let results: Vec<_> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| {
                source
                    .load(symbol)
                    .and_then(|bars| screener.analyze(symbol, &bars))
                    .map(|moves| ScanResult {
                        symbol: symbol.clone(),
                        moves,
                    })
                    .map_err(|error| {
                        debug!(symbol = %symbol, %error, "symbol skipped");
                        ScanError {
                            symbol: symbol.clone(),
                            error,
                        }
                    })
            })
            .collect()
    });

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    successes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    errors.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    Ok((successes, errors))
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + chrono::Duration::days(offset)
    }

    fn flat_bars(n: usize, volume: f64) -> Vec<Bar> {
        (0..n as i64)
            .map(|i| Bar::new(day(i), 10.0, 10.2, 9.9, 10.0, volume))
            .collect()
    }

    struct MemorySource(HashMap<String, Vec<Bar>>);

    impl loader::BarSource for MemorySource {
        fn load(&self, symbol: &str) -> Result<Vec<Bar>> {
            self.0
                .get(symbol)
                .cloned()
                .ok_or(ScreenError::NoValidBars)
        }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(0).is_err());
        assert_eq!(Period::new(20).unwrap().get(), 20);
    }

    #[test]
    fn test_calendar_days_validation() {
        assert!(CalendarDays::new(0).is_err());
        assert!(CalendarDays::new(-5).is_err());
        assert_eq!(CalendarDays::from_days(-5).get(), -5);
    }

    #[test]
    fn test_bar_validation() {
        assert!(Bar::new(day(0), 10.0, 11.0, 9.0, 10.5, 100.0).is_valid());
        assert_eq!(
            Bar::new(day(0), 10.0, 11.0, 0.0, 10.5, 100.0).validate(),
            Err("non-positive price")
        );
        assert_eq!(
            Bar::new(day(0), 10.0, 11.0, 9.0, 10.5, -1.0).validate(),
            Err("negative volume")
        );
        assert_eq!(
            Bar::new(day(0), 10.0, 9.0, 11.0, 10.5, 1.0).validate(),
            Err("high < low")
        );
    }

    #[test]
    fn test_builder_defaults() {
        let screener = ScreenerBuilder::new().build().unwrap();
        assert_eq!(screener.config().min_bars.get(), params::MIN_BARS);
        assert_eq!(screener.config().max_concurrent.get(), params::MAX_CONCURRENT);
    }

    #[test]
    fn test_builder_rejects_min_bars_below_volume_window() {
        let result = ScreenerBuilder::new().min_bars(10).unwrap().build();
        assert!(matches!(result, Err(ScreenError::InvalidConfig(_))));
    }

    #[test]
    fn test_short_series_is_rejection_not_empty() {
        let screener = ScreenerBuilder::new().build().unwrap();
        let err = screener.analyze("SHORT", &flat_bars(99, 1e6)).unwrap_err();
        assert!(matches!(
            err,
            ScreenError::InsufficientData { need: 100, got: 99 }
        ));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_low_volume_rejected() {
        let screener = ScreenerBuilder::new().build().unwrap();
        let err = screener.analyze("THIN", &flat_bars(120, 1000.0)).unwrap_err();
        assert!(err.is_volume_failure());
    }

    #[test]
    fn test_unsorted_bars_rejected() {
        let screener = ScreenerBuilder::new().build().unwrap();
        let mut bars = flat_bars(120, 1e6);
        bars.swap(5, 6);
        assert!(matches!(
            screener.analyze("MESSY", &bars),
            Err(ScreenError::InvalidBar { index: 6, .. })
        ));
    }

    #[test]
    fn test_flat_series_has_no_moves() {
        let screener = ScreenerBuilder::new().build().unwrap();
        assert!(screener.analyze("FLAT", &flat_bars(150, 1e6)).unwrap().is_empty());
    }

    #[test]
    fn test_scan_parallel_isolates_failures() {
        let mut data = HashMap::new();
        data.insert("AAA".to_string(), flat_bars(150, 1e6));
        data.insert("BBB".to_string(), flat_bars(30, 1e6));
        data.insert("CCC".to_string(), flat_bars(150, 10.0));
        let source = MemorySource(data);
        let screener = ScreenerBuilder::new().max_concurrent(2).unwrap().build().unwrap();

        let symbols: Vec<String> = ["CCC", "MISSING", "BBB", "AAA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (ok, failed) = scan_parallel(&screener, &source, &symbols).unwrap();

        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].symbol, "AAA");
        let failed: Vec<&str> = failed.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(failed, vec!["BBB", "CCC", "MISSING"]);
    }

    struct CountingSource {
        bars: Vec<Bar>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl loader::BarSource for CountingSource {
        fn load(&self, _symbol: &str) -> Result<Vec<Bar>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.bars.clone())
        }
    }

    #[test]
    fn test_scan_parallel_bounds_concurrent_loads() {
        let source = CountingSource {
            bars: flat_bars(150, 1e6),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let screener = ScreenerBuilder::new().max_concurrent(2).unwrap().build().unwrap();
        let symbols: Vec<String> = (0..10).map(|i| format!("SYM{i}")).collect();

        let (ok, failed) = scan_parallel(&screener, &source, &symbols).unwrap();

        assert_eq!(ok.len(), 10);
        assert!(failed.is_empty());
        let peak = source.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "{peak} loads ran at once");
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    }
}
