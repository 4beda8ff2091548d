//! Tunable thresholds for the screener
//!
//! This module provides the configuration layer:
//! - [`MoveParams`]: every threshold the growth-move state machine and classifier use
//! - [`GateParams`]: the liquidity (volume) gate
//! - [`ScreenerConfig`]: the above plus run-level settings, loadable from JSON
//! - [`ParamMeta`]: metadata describing each tunable, used to validate `key=value` overrides
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use sp_screener::params::{MoveParams, Parameterized};
//!
//! for param in MoveParams::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut overrides = HashMap::new();
//! overrides.insert("end_decline", 0.25);
//! let params = MoveParams::with_params(&overrides).unwrap();
//! assert!((params.end_decline.get() - 0.25).abs() < f64::EPSILON);
//! ```

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{detectors::helpers as d, CalendarDays, Period, Ratio, Result, ScreenError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Bar count (positive integer)
  Period,
  /// Calendar-day span (positive integer)
  Days,
  /// Unbounded positive number (prices, percents, share counts)
  Value,
}

/// Metadata for a single tunable
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name as accepted by `with_params` (e.g., "end_decline")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Accepted range: (min, max)
  pub range: (f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn days(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Days, default, range, description }
  }

  pub const fn value(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Value, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(ScreenError::InvalidValue("parameter must be finite"));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(ScreenError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period | ParamType::Days => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(ScreenError::InvalidValue("bar and day counts must be positive integers"));
        }
        Ok(())
      },
      ParamType::Ratio | ParamType::Value => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Trait for parameter sets that can be built from `name -> value` overrides
pub trait Parameterized: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates the set from a HashMap; missing parameters keep their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Look up the metadata entry for `name`
  fn meta_for(name: &str) -> Option<&'static ParamMeta> {
    Self::param_meta().iter().find(|m| m.name == name)
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

fn check_key(meta: &'static [ParamMeta], params: &HashMap<&str, f64>, key: &str) -> Result<()> {
  match (meta.iter().find(|m| m.name == key), params.get(key)) {
    (Some(m), Some(&value)) => m.validate(value),
    (None, _) => Err(ScreenError::InvalidConfig(format!("unknown parameter '{key}'"))),
    (Some(_), None) => Ok(()),
  }
}

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: Ratio) -> Result<Ratio> {
  match params.get(key) {
    Some(&value) => Ratio::new(value),
    None => Ok(default),
  }
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: Period) -> Result<Period> {
  match params.get(key) {
    Some(&value) => Period::new(value as usize),
    None => Ok(default),
  }
}

/// Helper to get a CalendarDays span from params with default fallback
pub fn get_days(params: &HashMap<&str, f64>, key: &str, default: CalendarDays) -> Result<CalendarDays> {
  match params.get(key) {
    Some(&value) => CalendarDays::new(value as i64),
    None => Ok(default),
  }
}

fn check_values(meta: &'static [ParamMeta], values: &[(&'static str, f64)]) -> Result<()> {
  for &(name, value) in values {
    match meta.iter().find(|m| m.name == name) {
      Some(m) => m.validate(value)?,
      None => return Err(ScreenError::InvalidConfig(format!("unknown parameter '{name}'"))),
    }
  }
  Ok(())
}

fn get_value(params: &HashMap<&str, f64>, key: &str, default: f64) -> f64 {
  params.get(key).copied().unwrap_or(default)
}

/// Parse `key=value` pairs (e.g. from the command line) into an override map
pub fn parse_overrides<'a>(pairs: &'a [String]) -> Result<HashMap<&'a str, f64>> {
  let mut map = HashMap::with_capacity(pairs.len());
  for pair in pairs {
    let (key, raw) = pair
      .split_once('=')
      .ok_or_else(|| ScreenError::InvalidConfig(format!("expected key=value, got '{pair}'")))?;
    let value: f64 = raw
      .trim()
      .parse()
      .map_err(|_| ScreenError::InvalidConfig(format!("'{raw}' is not a number for '{key}'")))?;
    map.insert(key.trim(), value);
  }
  Ok(map)
}

// ============================================================
// CLASSIFICATION WINDOW
// ============================================================

/// Duration window with its growth and superperformer gain thresholds (percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWindow {
  pub min_days: i64,
  pub max_days: i64,
  pub growth_pct: f64,
  pub super_pct: f64,
}

impl ClassWindow {
  #[inline]
  pub fn contains(&self, days: CalendarDays) -> bool {
    (self.min_days..=self.max_days).contains(&days.get())
  }
}

// ============================================================
// MOVE PARAMS
// ============================================================

/// Thresholds for move initiation, tracking, end conditions and classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveParams {
  pub min_lod: f64,
  pub lod_tolerance: Ratio,
  pub confirm_window: Period,
  pub confirm_rise: Ratio,
  pub end_decline: Ratio,
  pub drawdown_decline: Ratio,
  pub stagnation_bars: Period,
  pub max_duration: CalendarDays,
  pub continuation_window: CalendarDays,
  pub cooldown_bars: Period,
  /// Checked first; a duration inside both windows uses this one
  pub short_window: ClassWindow,
  pub long_window: ClassWindow,
}

impl Default for MoveParams {
  fn default() -> Self {
    Self {
      min_lod: d::MIN_LOD,
      lod_tolerance: Ratio::new_const(d::LOD_TOLERANCE),
      confirm_window: Period::new_const(d::CONFIRM_WINDOW_BARS),
      confirm_rise: Ratio::new_const(d::CONFIRM_RISE),
      end_decline: Ratio::new_const(d::END_DECLINE),
      drawdown_decline: Ratio::new_const(d::DRAWDOWN_DECLINE),
      stagnation_bars: Period::new_const(d::STAGNATION_BARS),
      max_duration: CalendarDays::new_const(d::MAX_DURATION_DAYS),
      continuation_window: CalendarDays::new_const(d::CONTINUATION_DAYS),
      cooldown_bars: Period::new_const(d::COOLDOWN_BARS),
      short_window: ClassWindow {
        min_days: d::SHORT_MIN_DAYS,
        max_days: d::SHORT_MAX_DAYS,
        growth_pct: d::SHORT_GROWTH_PCT,
        super_pct: d::SHORT_SUPER_PCT,
      },
      long_window: ClassWindow {
        min_days: d::SHORT_MAX_DAYS,
        max_days: d::LONG_MAX_DAYS,
        growth_pct: d::LONG_GROWTH_PCT,
        super_pct: d::LONG_SUPER_PCT,
      },
    }
  }
}

const MOVE_PARAMS: &[ParamMeta] = &[
  ParamMeta::value("min_lod", d::MIN_LOD, (0.0, 1.0), "Candidate LODs at or below this are ignored"),
  ParamMeta::ratio("lod_tolerance", d::LOD_TOLERANCE, (0.9, 1.0), "Low below lod * tolerance breaks the LOD"),
  ParamMeta::period("confirm_window", d::CONFIRM_WINDOW_BARS as f64, (1.0, 20.0), "Bars scanned for confirmation"),
  ParamMeta::ratio("confirm_rise", d::CONFIRM_RISE, (0.01, 0.5), "Rise from LOD that confirms a move"),
  ParamMeta::ratio("end_decline", d::END_DECLINE, (0.05, 0.9), "Decline from peak that suspends the move"),
  ParamMeta::ratio("drawdown_decline", d::DRAWDOWN_DECLINE, (0.01, 0.9), "Decline from peak that opens a drawdown"),
  ParamMeta::period("stagnation_bars", d::STAGNATION_BARS as f64, (1.0, 252.0), "Bars without a new high that end the move"),
  ParamMeta::days("max_duration_days", d::MAX_DURATION_DAYS as f64, (1.0, 3650.0), "Calendar days after which the move ends"),
  ParamMeta::days("continuation_days", d::CONTINUATION_DAYS as f64, (1.0, 730.0), "Calendar days after the peak allowed for a continuation"),
  ParamMeta::period("cooldown_bars", d::COOLDOWN_BARS as f64, (1.0, 504.0), "Bars after a close before a new move may start"),
  ParamMeta::days("short_min_days", d::SHORT_MIN_DAYS as f64, (1.0, 3650.0), "Short window lower bound"),
  ParamMeta::days("short_max_days", d::SHORT_MAX_DAYS as f64, (1.0, 3650.0), "Short window upper bound (inclusive)"),
  ParamMeta::value("short_growth_pct", d::SHORT_GROWTH_PCT, (1.0, 100_000.0), "Short window growth gain %"),
  ParamMeta::value("short_super_pct", d::SHORT_SUPER_PCT, (1.0, 100_000.0), "Short window superperformer gain %"),
  ParamMeta::days("long_max_days", d::LONG_MAX_DAYS as f64, (1.0, 3650.0), "Long window upper bound (inclusive)"),
  ParamMeta::value("long_growth_pct", d::LONG_GROWTH_PCT, (1.0, 100_000.0), "Long window growth gain %"),
  ParamMeta::value("long_super_pct", d::LONG_SUPER_PCT, (1.0, 100_000.0), "Long window superperformer gain %"),
];

impl Parameterized for MoveParams {
  fn param_meta() -> &'static [ParamMeta] {
    MOVE_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Self::default().apply(params)
  }
}

impl MoveParams {
  /// Apply overrides on top of `self`, rejecting unknown keys.
  pub fn apply(self, params: &HashMap<&str, f64>) -> Result<Self> {
    let known: Vec<&str> = params
      .keys()
      .copied()
      .filter(|k| Self::meta_for(k).is_some() || GateParams::meta_for(k).is_some())
      .collect();
    if let Some(unknown) = params.keys().find(|k| !known.contains(k)) {
      return Err(ScreenError::InvalidConfig(format!("unknown parameter '{unknown}'")));
    }
    for key in params.keys().filter(|k| Self::meta_for(k).is_some()) {
      check_key(MOVE_PARAMS, params, key)?;
    }

    let mut short_window = self.short_window;
    short_window.min_days = get_value(params, "short_min_days", short_window.min_days as f64) as i64;
    short_window.max_days = get_value(params, "short_max_days", short_window.max_days as f64) as i64;
    short_window.growth_pct = get_value(params, "short_growth_pct", short_window.growth_pct);
    short_window.super_pct = get_value(params, "short_super_pct", short_window.super_pct);

    let mut long_window = self.long_window;
    if params.contains_key("short_max_days") {
      long_window.min_days = short_window.max_days;
    }
    long_window.max_days = get_value(params, "long_max_days", long_window.max_days as f64) as i64;
    long_window.growth_pct = get_value(params, "long_growth_pct", long_window.growth_pct);
    long_window.super_pct = get_value(params, "long_super_pct", long_window.super_pct);

    let params = Self {
      min_lod: get_value(params, "min_lod", self.min_lod),
      lod_tolerance: get_ratio(params, "lod_tolerance", self.lod_tolerance)?,
      confirm_window: get_period(params, "confirm_window", self.confirm_window)?,
      confirm_rise: get_ratio(params, "confirm_rise", self.confirm_rise)?,
      end_decline: get_ratio(params, "end_decline", self.end_decline)?,
      drawdown_decline: get_ratio(params, "drawdown_decline", self.drawdown_decline)?,
      stagnation_bars: get_period(params, "stagnation_bars", self.stagnation_bars)?,
      max_duration: get_days(params, "max_duration_days", self.max_duration)?,
      continuation_window: get_days(params, "continuation_days", self.continuation_window)?,
      cooldown_bars: get_period(params, "cooldown_bars", self.cooldown_bars)?,
      short_window,
      long_window,
    };
    params.validate()?;
    Ok(params)
  }

  /// Current value of every tunable, keyed like [`MOVE_PARAMS`]
  fn values(&self) -> [(&'static str, f64); 17] {
    let (s, l) = (&self.short_window, &self.long_window);
    [
      ("min_lod", self.min_lod),
      ("lod_tolerance", self.lod_tolerance.get()),
      ("confirm_window", self.confirm_window.get() as f64),
      ("confirm_rise", self.confirm_rise.get()),
      ("end_decline", self.end_decline.get()),
      ("drawdown_decline", self.drawdown_decline.get()),
      ("stagnation_bars", self.stagnation_bars.get() as f64),
      ("max_duration_days", self.max_duration.get() as f64),
      ("continuation_days", self.continuation_window.get() as f64),
      ("cooldown_bars", self.cooldown_bars.get() as f64),
      ("short_min_days", s.min_days as f64),
      ("short_max_days", s.max_days as f64),
      ("short_growth_pct", s.growth_pct),
      ("short_super_pct", s.super_pct),
      ("long_max_days", l.max_days as f64),
      ("long_growth_pct", l.growth_pct),
      ("long_super_pct", l.super_pct),
    ]
  }

  /// Check every field against its [`ParamMeta`] range
  pub fn check_ranges(&self) -> Result<()> {
    check_values(MOVE_PARAMS, &self.values())
  }

  /// Range checks plus cross-field consistency checks
  pub fn validate(&self) -> Result<()> {
    self.check_ranges()?;
    if self.drawdown_decline.get() >= self.end_decline.get() {
      return Err(ScreenError::InvalidConfig(
        "drawdown_decline must be below end_decline".to_string(),
      ));
    }
    for (label, w) in [("short", &self.short_window), ("long", &self.long_window)] {
      if w.min_days > w.max_days {
        return Err(ScreenError::InvalidConfig(format!("{label} window min_days > max_days")));
      }
      if w.super_pct < w.growth_pct {
        return Err(ScreenError::InvalidConfig(format!(
          "{label} window superperformer threshold below growth threshold"
        )));
      }
    }
    if self.long_window.min_days < self.short_window.max_days {
      return Err(ScreenError::InvalidConfig("long window must start where short window ends".to_string()));
    }
    Ok(())
  }
}

// ============================================================
// GATE PARAMS
// ============================================================

/// Liquidity gate applied before detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
  /// Minimum average daily volume (shares)
  pub min_avg_volume: f64,
  /// Trailing bars averaged
  pub window: Period,
}

/// Default volume floor: 200,000 shares/day
pub const MIN_AVG_VOLUME: f64 = 200_000.0;
/// Default volume window (bars)
pub const VOLUME_WINDOW: usize = 20;

impl Default for GateParams {
  fn default() -> Self {
    Self { min_avg_volume: MIN_AVG_VOLUME, window: Period::new_const(VOLUME_WINDOW) }
  }
}

const GATE_PARAMS: &[ParamMeta] = &[
  ParamMeta::value("min_avg_volume", MIN_AVG_VOLUME, (0.0, 1.0e12), "Minimum average daily volume"),
  ParamMeta::period("volume_window", VOLUME_WINDOW as f64, (1.0, 252.0), "Trailing bars in the volume average"),
];

impl Parameterized for GateParams {
  fn param_meta() -> &'static [ParamMeta] {
    GATE_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Self::default().apply(params)
  }
}

impl GateParams {
  /// Apply the gate keys among `params`; keys belonging to other sets are ignored.
  pub fn apply(self, params: &HashMap<&str, f64>) -> Result<Self> {
    for key in params.keys().filter(|k| Self::meta_for(k).is_some()) {
      check_key(GATE_PARAMS, params, key)?;
    }
    Ok(Self {
      min_avg_volume: get_value(params, "min_avg_volume", self.min_avg_volume),
      window: get_period(params, "volume_window", self.window)?,
    })
  }

  /// Check both fields against their [`ParamMeta`] ranges
  pub fn validate(&self) -> Result<()> {
    check_values(
      GATE_PARAMS,
      &[("min_avg_volume", self.min_avg_volume), ("volume_window", self.window.get() as f64)],
    )
  }
}

// ============================================================
// SCREENER CONFIG
// ============================================================

/// Default minimum series length for detection
pub const MIN_BARS: usize = 100;
/// Default number of symbols analyzed concurrently
pub const MAX_CONCURRENT: usize = 5;

/// Full screener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
  pub moves: MoveParams,
  pub gate: GateParams,
  /// Series shorter than this are rejected outright
  pub min_bars: Period,
  /// Size of the permit pool for per-symbol analysis
  pub max_concurrent: Period,
}

impl Default for ScreenerConfig {
  fn default() -> Self {
    Self {
      moves: MoveParams::default(),
      gate: GateParams::default(),
      min_bars: Period::new_const(MIN_BARS),
      max_concurrent: Period::new_const(MAX_CONCURRENT),
    }
  }
}

impl ScreenerConfig {
  /// Load from a JSON file. Missing fields keep their defaults.
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
      .map_err(|e| ScreenError::InvalidConfig(format!("cannot read {}: {e}", path.display())))?;
    Self::from_json_str(&raw)
  }

  pub fn from_json_str(raw: &str) -> Result<Self> {
    let config: Self =
      serde_json::from_str(raw).map_err(|e| ScreenError::InvalidConfig(format!("invalid config JSON: {e}")))?;
    config.moves.validate()?;
    config.gate.validate()?;
    Ok(config)
  }

  /// Apply `key=value` overrides to both parameter sets
  pub fn with_overrides(self, params: &HashMap<&str, f64>) -> Result<Self> {
    Ok(Self {
      moves: self.moves.apply(params)?,
      gate: self.gate.apply(params)?,
      min_bars: self.min_bars,
      max_concurrent: self.max_concurrent,
    })
  }
}

// ============================================================
// TESTS
// ============================================================
