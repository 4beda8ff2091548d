//! Aggregation and output of screening results
//!
//! Flattens per-symbol outcomes into one gain-ordered list, counts failures by
//! kind, and writes JSON, CSV or a console table.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::{
    detectors::{MoveResult, DISPLAY_DATE},
    ScanError, ScanResult, ScreenError,
};

/// Report output failures
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Aggregation
// =============================================================================

/// Sort by total gain, highest first
pub fn sort_by_gain(results: &mut [MoveResult]) {
    results.sort_by(|a, b| b.gain_percent.total_cmp(&a.gain_percent));
}

/// All moves across symbols, highest gain first
pub fn collect_moves(results: &[ScanResult]) -> Vec<MoveResult> {
    let mut moves: Vec<MoveResult> = results.iter().flat_map(|r| r.moves.iter().cloned()).collect();
    sort_by_gain(&mut moves);
    moves
}

/// Counts for the end-of-run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScreenSummary {
    pub symbols: usize,
    pub processed: usize,
    pub failed: usize,
    pub volume_failures: usize,
    pub data_failures: usize,
    pub fetch_failures: usize,
    /// Symbols with at least one qualifying move
    pub growth_stocks: usize,
    /// Superperformer moves
    pub superperformers: usize,
    pub total_moves: usize,
}

impl ScreenSummary {
    pub fn from_scan(symbols: usize, results: &[ScanResult], errors: &[ScanError]) -> Self {
        let mut summary = Self {
            symbols,
            processed: results.len(),
            failed: errors.len(),
            ..Self::default()
        };

        for err in errors {
            match &err.error {
                e if e.is_volume_failure() => summary.volume_failures += 1,
                e if e.is_rejection() => summary.data_failures += 1,
                ScreenError::InvalidBar { .. } => summary.data_failures += 1,
                _ => summary.fetch_failures += 1,
            }
        }

        for r in results.iter().filter(|r| !r.moves.is_empty()) {
            summary.growth_stocks += 1;
            summary.total_moves += r.moves.len();
            summary.superperformers += r.moves.iter().filter(|m| m.is_superperformer).count();
        }
        summary
    }
}

impl std::fmt::Display for ScreenSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Symbols analyzed:        {}", self.symbols)?;
        writeln!(f, "Successfully processed:  {}", self.processed)?;
        writeln!(f, "Failed:                  {}", self.failed)?;
        if self.failed > 0 {
            writeln!(f, "  volume failures:       {}", self.volume_failures)?;
            writeln!(f, "  data failures:         {}", self.data_failures)?;
            writeln!(f, "  fetch failures:        {}", self.fetch_failures)?;
        }
        writeln!(f, "Growth stocks:           {}", self.growth_stocks)?;
        writeln!(f, "Superperformers:         {}", self.superperformers)?;
        write!(f, "Total growth moves:      {}", self.total_moves)
    }
}

// =============================================================================
// CSV / JSON
// =============================================================================

/// One CSV row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    pub superperformance: &'static str,
    pub drawdowns: String,
    pub continuation: &'static str,
    pub total_gain: String,
    pub duration_days: i64,
}

impl From<&MoveResult> for ResultRow {
    fn from(r: &MoveResult) -> Self {
        Self {
            ticker: r.ticker.clone(),
            start_date: r.start_date.format(DISPLAY_DATE).to_string(),
            end_date: r.end_date.format(DISPLAY_DATE).to_string(),
            superperformance: if r.is_superperformer { "Yes" } else { "No" },
            drawdowns: r.drawdown_summary(),
            continuation: r.continuation_summary(),
            total_gain: format!("{:.2}", r.gain_percent),
            duration_days: r.duration_days.get(),
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Write results as pretty-printed JSON
pub fn save_json(results: &[MoveResult], path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    serde_json::to_writer_pretty(create(path)?, results)?;
    info!(path = %path.display(), results = results.len(), "saved JSON results");
    Ok(())
}

/// Write results as CSV
pub fn save_csv(results: &[MoveResult], path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(create(path)?);
    for r in results {
        writer.serialize(ResultRow::from(r))?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), results = results.len(), "saved CSV results");
    Ok(())
}

// =============================================================================
// Console
// =============================================================================

/// Top `top` results as a fixed-width table
pub fn render_table(results: &[MoveResult], top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<13} {:<13} {:>9} {:>5} {:<6} {:<5} Drawdowns",
        "Ticker", "Start", "End", "Gain%", "Days", "Super", "Cont"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for r in results.iter().take(top) {
        let _ = writeln!(
            out,
            "{:<8} {:<13} {:<13} {:>9.1} {:>5} {:<6} {:<5} {}",
            r.ticker,
            r.start_date.format(DISPLAY_DATE).to_string(),
            r.end_date.format(DISPLAY_DATE).to_string(),
            r.gain_percent,
            r.duration_days.get(),
            if r.is_superperformer { "Yes" } else { "No" },
            r.continuation_summary(),
            r.drawdown_summary()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{Continuation, EndReason};
    use crate::CalendarDays;
    use chrono::NaiveDate;

    fn result(ticker: &str, gain: f64, superperformer: bool) -> MoveResult {
        MoveResult {
            ticker: ticker.to_string(),
            start_date: NaiveDate::from_ymd_opt(2006, 1, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2006, 4, 12).unwrap(),
            actual_end_date: NaiveDate::from_ymd_opt(2006, 5, 12).unwrap(),
            end_reason: EndReason::NoNewHigh,
            lod: 10.0,
            peak_price: 10.0 * (1.0 + gain / 100.0),
            gain_percent: gain,
            duration_days: CalendarDays::from_days(100),
            is_superperformer: superperformer,
            drawdowns: Vec::new(),
            continuations: Vec::new(),
        }
    }

    fn scan(symbol: &str, moves: Vec<MoveResult>) -> ScanResult {
        ScanResult {
            symbol: symbol.to_string(),
            moves,
        }
    }

    fn failure(symbol: &str, error: ScreenError) -> ScanError {
        ScanError {
            symbol: symbol.to_string(),
            error,
        }
    }

    #[test]
    fn test_collect_sorts_by_gain() {
        let results = vec![
            scan("AAA", vec![result("AAA", 120.0, false)]),
            scan("BBB", vec![result("BBB", 450.0, true), result("BBB", 180.0, false)]),
        ];
        let moves = collect_moves(&results);
        let gains: Vec<f64> = moves.iter().map(|m| m.gain_percent).collect();
        assert_eq!(gains, vec![450.0, 180.0, 120.0]);
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            scan("AAA", vec![result("AAA", 120.0, false)]),
            scan("BBB", vec![result("BBB", 450.0, true), result("BBB", 180.0, false)]),
            scan("CCC", Vec::new()),
        ];
        let errors = vec![
            failure("DDD", ScreenError::VolumeTooLow { average: 1.0, floor: 2.0 }),
            failure("EEE", ScreenError::InsufficientData { need: 100, got: 3 }),
            failure("FFF", ScreenError::InvalidConfig("boom".into())),
        ];
        let summary = ScreenSummary::from_scan(6, &results, &errors);
        assert_eq!(
            summary,
            ScreenSummary {
                symbols: 6,
                processed: 3,
                failed: 3,
                volume_failures: 1,
                data_failures: 1,
                fetch_failures: 1,
                growth_stocks: 2,
                superperformers: 1,
                total_moves: 3,
            }
        );
    }

    #[test]
    fn test_result_row_format() {
        let mut r = result("ACME", 200.0, false);
        r.continuations.push(Continuation {
            old_peak: 25.0,
            continuation_date: NaiveDate::from_ymd_opt(2006, 3, 1).unwrap(),
            new_lod: 18.0,
        });
        let row = ResultRow::from(&r);
        assert_eq!(row.start_date, "Jan 2, 2006");
        assert_eq!(row.end_date, "Apr 12, 2006");
        assert_eq!(row.total_gain, "200.00");
        assert_eq!(row.superperformance, "No");
        assert_eq!(row.continuation, "Yes");
        assert_eq!(row.drawdowns, "none");
    }

    #[test]
    fn test_save_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.csv");
        save_csv(&[result("ACME", 123.456, true)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Ticker,StartDate,EndDate,Superperformance,Drawdowns,Continuation,TotalGain,DurationDays")
        );
        assert_eq!(
            lines.next(),
            Some("ACME,\"Jan 2, 2006\",\"Apr 12, 2006\",Yes,none,none,123.46,100")
        );
    }

    #[test]
    fn test_save_json_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let results = vec![result("ACME", 150.0, false)];
        save_json(&results, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: Vec<MoveResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded, results);
    }

    #[test]
    fn test_render_table_limits_rows() {
        let results = vec![
            result("AAA", 300.0, true),
            result("BBB", 200.0, false),
            result("CCC", 100.0, false),
        ];
        let table = render_table(&results, 2);
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("AAA"));
        assert!(table.contains("Jan 2, 2006"));
        assert!(!table.contains("CCC"));
    }
}
