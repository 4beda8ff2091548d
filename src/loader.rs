//! Bar and symbol loading
//!
//! Reads daily bars from per-symbol CSV files and symbol lists from a CSV watchlist.
//! Loaded series are sorted, deduplicated and stripped of physically invalid bars
//! before they reach the screener.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::{Bar, OHLCVExt, Result, ScreenError};

// =============================================================================
// Errors
// =============================================================================

/// Loader failures. Never retried by the screener.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("No data file for {symbol}: {}", path.display())]
    Missing { symbol: String, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row}: failed to parse date {value:?}")]
    Date { row: usize, value: String },

    #[error("Row {row}: missing or invalid {column}")]
    Field { row: usize, column: &'static str },
}

// =============================================================================
// Sources
// =============================================================================

/// Anything that can produce the bar series for a symbol
pub trait BarSource {
    fn load(&self, symbol: &str) -> Result<Vec<Bar>>;
}

/// Reads `<data_dir>/<SYMBOL>.csv` with columns `date,open,high,low,close,volume`
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    data_dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }
}

impl BarSource for CsvBarSource {
    fn load(&self, symbol: &str) -> Result<Vec<Bar>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(LoadError::Missing {
                symbol: symbol.to_string(),
                path,
            }
            .into());
        }

        let raw = read_bars(&path)?;
        let loaded = raw.len();
        let bars = sanitize_bars(raw);
        if bars.is_empty() {
            return Err(ScreenError::NoValidBars);
        }

        debug!(symbol, loaded, kept = bars.len(), "bars loaded");
        Ok(bars)
    }
}

// =============================================================================
// CSV Parsing
// =============================================================================

/// Parse a bar date. Time and offset components are dropped.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

fn field(record: &csv::StringRecord, row: usize, index: usize, column: &'static str) -> std::result::Result<f64, LoadError> {
    record
        .get(index)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or(LoadError::Field { row, column })
}

/// Read every row of a bar CSV as-is (unsorted, unfiltered)
pub fn read_bars(path: impl AsRef<Path>) -> std::result::Result<Vec<Bar>, LoadError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut bars = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;

        let raw_date = record.get(0).ok_or(LoadError::Field { row, column: "date" })?;
        let date = parse_date(raw_date).ok_or_else(|| LoadError::Date {
            row,
            value: raw_date.to_string(),
        })?;

        bars.push(Bar {
            date,
            open: field(&record, row, 1, "open")?,
            high: field(&record, row, 2, "high")?,
            low: field(&record, row, 3, "low")?,
            close: field(&record, row, 4, "close")?,
            volume: field(&record, row, 5, "volume")?,
        });
    }

    Ok(bars)
}

/// Sort ascending by date, drop invalid bars, keep the first bar of each date.
pub fn sanitize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();

    bars.retain(|b| b.is_valid());
    let invalid = before - bars.len();

    bars.sort_by_key(|b| b.date);
    let valid = bars.len();
    bars.dedup_by_key(|b| b.date);
    let duplicates = valid - bars.len();

    if invalid > 0 || duplicates > 0 {
        warn!(invalid, duplicates, kept = bars.len(), "dropped bars");
    }
    bars
}

// =============================================================================
// Symbol Lists
// =============================================================================

/// Load a watchlist: header skipped, first column, trimmed and upper-cased.
pub fn load_symbols(path: impl AsRef<Path>) -> std::result::Result<Vec<String>, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut symbols = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        match record.get(0).map(|s| s.trim().to_uppercase()) {
            Some(symbol) if !symbol.is_empty() => symbols.push(symbol),
            _ => skipped += 1,
        }
    }

    info!(
        path = %path.display(),
        symbols = symbols.len(),
        skipped,
        "loaded symbol list"
    );
    Ok(symbols)
}
