//! Scan progress reporting.
//!
//! Observers are called from worker threads in completion order, so
//! implementations must be `Send + Sync` and should return quickly.

use tracing::{debug, info};

use macdscan_core::domain::InstrumentId;

use crate::result::ScanResult;
use crate::scanner::ScanStats;

/// Progress after one instrument finished, whatever its outcome.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Instruments processed so far, including this one.
    pub index: usize,
    pub total: usize,
    pub instrument: InstrumentId,
    /// Results included so far.
    pub found: usize,
}

impl ScanProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.index as f64 / self.total as f64
        }
    }
}

pub trait ScanObserver: Send + Sync {
    fn on_progress(&self, _progress: &ScanProgress) {}

    /// Called once per included result, as soon as it is appended.
    fn on_match(&self, _result: &ScanResult, _found: usize) {}

    fn on_complete(&self, _stats: &ScanStats) {}
}

/// Observer that ignores every event.
pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// Observer that reports through `tracing`.
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn on_progress(&self, progress: &ScanProgress) {
        debug!(
            "[{}/{}] {} (found {})",
            progress.index, progress.total, progress.instrument, progress.found
        );
    }

    fn on_match(&self, result: &ScanResult, found: usize) {
        info!(
            symbol = %result.instrument.symbol(),
            strength = result.strength(),
            found,
            "match: {}",
            result.signal.confirmation_summary()
        );
    }

    fn on_complete(&self, stats: &ScanStats) {
        info!(
            processed = stats.processed,
            total = stats.total,
            found = stats.found,
            "scan complete"
        );
    }
}
