//! Result export: CSV for spreadsheets, JSON for the full report, and a plain
//! text table for terminals.
//!
//! CSV output starts with a UTF-8 byte-order mark so spreadsheet tools detect
//! the encoding of non-ASCII instrument names. Values are kept at full
//! precision in memory and rounded only here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::result::ScanResult;
use crate::scanner::ScanReport;
use crate::summary::{ScanSummary, StrengthTier};

/// UTF-8 byte-order mark written ahead of the CSV header.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Columns of [`export_csv`], in order.
pub const CSV_COLUMNS: [&str; 22] = [
    "code",
    "name",
    "market",
    "close",
    "period_low",
    "period_end",
    "mode",
    "macd_level",
    "strength",
    "confirmations",
    "macd",
    "signal",
    "histogram",
    "prior_histogram",
    "k",
    "d",
    "rsi",
    "crossover_magnitude",
    "shrink_magnitude",
    "shrink_pct",
    "trailing_dividend",
    "yield_pct",
];

fn fixed(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        String::new()
    }
}

fn fixed_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|v| fixed(v, decimals)).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export results as BOM-prefixed UTF-8 CSV, one row per result.
pub fn export_csv(results: &[ScanResult]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    wtr.write_record(CSV_COLUMNS)?;

    for r in results {
        let s = &r.signal;
        wtr.write_record([
            r.instrument.code.clone(),
            r.instrument.name.clone(),
            r.instrument.market.label().to_string(),
            fixed(r.latest_close, 2),
            fixed(r.latest_low, 2),
            r.latest_date.to_string(),
            s.mode.as_str().to_string(),
            s.level.to_string(),
            s.strength().to_string(),
            s.confirmation_summary(),
            fixed(s.current.macd, 4),
            fixed(s.current.signal, 4),
            fixed(s.current.histogram, 4),
            fixed(s.prior.histogram, 4),
            fixed(s.current.k, 2),
            fixed(s.current.d, 2),
            fixed(s.current.rsi, 2),
            fixed_opt(s.crossover_magnitude(), 4),
            fixed_opt(s.shrink_magnitude(), 4),
            fixed_opt(s.shrink_percent(), 2),
            fixed(r.dividend.trailing_total, 2),
            fixed(r.dividend.yield_pct, 2),
        ])?;
    }

    wtr.into_inner().context("failed to flush CSV writer")
}

/// File name for a CSV export written at the current local time.
pub fn csv_file_name() -> String {
    format!(
        "monthly_macd_scan_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M")
    )
}

/// Write results to `output_dir/monthly_macd_scan_YYYYMMDD_HHMM.csv`.
pub fn save_csv(results: &[ScanResult], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join(csv_file_name());
    let data = export_csv(results)?;
    std::fs::write(&path, data)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize the full report (results, stats, scan id) to pretty JSON.
///
/// Warm-up NaN indicator values serialize as `null`.
pub fn export_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScanReport to JSON")
}

/// Write the report next to its CSV, using the same timestamped stem.
pub fn save_json(report: &ScanReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join(csv_file_name()).with_extension("json");
    std::fs::write(&path, export_json(report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

// ─── Text table ─────────────────────────────────────────────────────

/// Fixed-width table of results for terminal output.
pub fn format_table(results: &[ScanResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<8} {:<12} {:<6} {:>9} {:>9} {:>3} {:>9} {:>7}  {}\n",
        "#", "code", "name", "mkt", "close", "hist", "str", "magnitude", "yield%", "confirmations"
    ));
    for (i, r) in results.iter().enumerate() {
        let s = &r.signal;
        let magnitude = match s.shrink_percent() {
            Some(pct) => format!("{pct:.1}%"),
            None => fixed(s.sort_magnitude(), 4),
        };
        out.push_str(&format!(
            "{:<4} {:<8} {:<12} {:<6} {:>9} {:>9} {:>3} {:>9} {:>7}  {}\n",
            i + 1,
            r.instrument.code,
            truncate(r.instrument.display_name(), 12),
            r.instrument.market.label(),
            fixed(r.latest_close, 2),
            fixed(s.current.histogram, 4),
            s.strength(),
            magnitude,
            fixed(r.dividend.yield_pct, 2),
            s.confirmation_summary(),
        ));
    }
    out
}

/// One-paragraph summary of a finished scan.
pub fn format_summary(report: &ScanReport) -> String {
    let ScanSummary {
        found,
        strong,
        medium,
        weak,
        bullish,
        primary,
        secondary,
    } = report.summary();
    let stats = &report.stats;
    format!(
        "{found} matches ({} {strong}, {} {medium}, {} {weak}), {bullish} with MACD > 0, \
         {primary} listed / {secondary} OTC\n\
         processed {}/{} in {:.1}s: {} skipped, {} no signal, {} filtered out",
        StrengthTier::Strong.label(),
        StrengthTier::Medium.label(),
        StrengthTier::Weak.label(),
        stats.processed,
        stats.total,
        report.elapsed.as_secs_f64(),
        stats.skipped(),
        stats.no_match,
        stats.filtered_out,
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
