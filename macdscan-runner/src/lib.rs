//! macdscan runner: scan orchestration, filtering, summaries and export.
//!
//! This crate builds on `macdscan-core` to provide:
//! - Serializable scan configuration with presets and a content-addressed scan id
//! - The fault-tolerant scan loop (worker pool, cancellation, progress streaming)
//! - Inclusion filters and the presentation sort order
//! - Dashboard counts
//! - CSV, JSON and text-table export

pub mod config;
pub mod export;
pub mod filter;
pub mod progress;
pub mod result;
pub mod scanner;
pub mod summary;

pub use config::{ConfigError, ScanConfig, ScanId, PRESET_NAMES};
pub use export::{export_csv, export_json, format_summary, format_table, save_csv, save_json};
pub use filter::{filter_results, sort_results, ScanFilters};
pub use progress::{LogObserver, NullObserver, ScanObserver, ScanProgress};
pub use result::ScanResult;
pub use scanner::{
    evaluate_instrument, run_scan, InstrumentOutcome, ScanError, ScanReport, ScanSources,
    ScanStats,
};
pub use summary::{ScanSummary, StrengthTier};
