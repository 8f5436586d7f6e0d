//! Scan orchestration: fetch, compute, detect, enrich and filter every
//! instrument of a universe under partial failure.
//!
//! Each instrument ends in exactly one [`InstrumentOutcome`]. Fetch failures
//! and short histories are skips, never errors; a panic inside one instrument's
//! pipeline is contained and counted as a no-data skip. Only an empty universe
//! or an invalid config aborts the scan.
//!
//! With `workers > 1` instruments are evaluated on a dedicated rayon pool and
//! results stream to the observer in completion order. The returned results
//! are sorted, so the final list does not depend on the worker count.

use chrono::NaiveDate;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use rayon::prelude::*;

use macdscan_core::data::{DividendSource, PriceSource};
use macdscan_core::dividend::{summarize_dividends, DividendSummary};
use macdscan_core::domain::InstrumentId;
use macdscan_core::indicators::IndicatorSet;
use macdscan_core::signal::{detect_latest, DetectionMode};

use crate::config::{ConfigError, ScanConfig, ScanId};
use crate::filter::sort_results;
use crate::progress::{ScanObserver, ScanProgress};
use crate::result::ScanResult;
use crate::summary::ScanSummary;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("universe unavailable: {0}")]
    UniverseUnavailable(String),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Terminal state of one instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    /// Fetch failed, returned nothing, or the pipeline panicked.
    SkippedNoData,
    /// Fewer than the minimum number of monthly bars.
    SkippedInsufficientHistory,
    NoMatch,
    FilteredOut,
    Included(Box<ScanResult>),
}

/// Price and dividend collaborators of one scan.
#[derive(Clone, Copy)]
pub struct ScanSources<'a> {
    pub prices: &'a dyn PriceSource,
    pub dividends: &'a dyn DividendSource,
}

impl<'a> ScanSources<'a> {
    pub fn new(prices: &'a dyn PriceSource, dividends: &'a dyn DividendSource) -> Self {
        Self { prices, dividends }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub total: usize,
    pub processed: usize,
    pub skipped_no_data: usize,
    pub skipped_insufficient_history: usize,
    pub no_match: usize,
    pub filtered_out: usize,
    pub found: usize,
}

impl ScanStats {
    pub fn skipped(&self) -> usize {
        self.skipped_no_data + self.skipped_insufficient_history
    }
}

/// Everything a finished (or cancelled) scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: ScanId,
    pub mode: DetectionMode,
    pub as_of: NaiveDate,
    /// Included results in presentation order.
    pub results: Vec<ScanResult>,
    pub stats: ScanStats,
    pub elapsed: Duration,
    /// True when the scan stopped before every instrument was processed.
    pub cancelled: bool,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from_results(&self.results)
    }
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    found: AtomicUsize,
    skipped_no_data: AtomicUsize,
    skipped_insufficient_history: AtomicUsize,
    no_match: AtomicUsize,
    filtered_out: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: &InstrumentOutcome) {
        let counter = match outcome {
            InstrumentOutcome::SkippedNoData => &self.skipped_no_data,
            InstrumentOutcome::SkippedInsufficientHistory => &self.skipped_insufficient_history,
            InstrumentOutcome::NoMatch => &self.no_match,
            InstrumentOutcome::FilteredOut => &self.filtered_out,
            // counted by the accumulator
            InstrumentOutcome::Included(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, total: usize) -> ScanStats {
        ScanStats {
            total,
            processed: self.processed.load(Ordering::Relaxed),
            skipped_no_data: self.skipped_no_data.load(Ordering::Relaxed),
            skipped_insufficient_history: self.skipped_insufficient_history.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            filtered_out: self.filtered_out.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run the per-instrument pipeline for one instrument.
///
/// `config` should be pinned (see [`ScanConfig::pinned`]) so every instrument
/// of a scan is evaluated against the same date.
pub fn evaluate_instrument(
    universe_index: usize,
    id: &InstrumentId,
    config: &ScanConfig,
    sources: ScanSources<'_>,
) -> InstrumentOutcome {
    let symbol = id.symbol();
    let (start, as_of) = config.window();

    let series = match sources.prices.fetch_monthly(id, start, as_of) {
        Ok(series) => series,
        Err(e) => {
            debug!(%symbol, error = %e, "skipped: no data");
            return InstrumentOutcome::SkippedNoData;
        }
    };
    if let Err(e) = series.ensure_min_history() {
        debug!(%symbol, error = %e, "skipped: insufficient history");
        return InstrumentOutcome::SkippedInsufficientHistory;
    }

    let indicators = IndicatorSet::compute(&series, &config.indicators);
    let Some(signal) = detect_latest(config.mode, &indicators) else {
        return InstrumentOutcome::NoMatch;
    };

    let latest = *series.latest();
    let dividend = match sources.dividends.fetch_dividends(id) {
        Ok(events) => {
            let reference_close = sources
                .prices
                .fetch_recent_close(id, as_of)
                .unwrap_or_else(|e| {
                    debug!(%symbol, error = %e, "recent close unavailable, using latest monthly close");
                    latest.close
                });
            summarize_dividends(&events, reference_close, as_of)
        }
        Err(e) => {
            debug!(%symbol, error = %e, "dividends unavailable");
            DividendSummary::unavailable()
        }
    };

    let result = ScanResult {
        universe_index,
        instrument: id.clone(),
        latest_close: latest.close,
        latest_low: latest.low,
        latest_date: latest.date,
        signal,
        dividend,
    };

    if let Some(reason) = config.filters.rejection(&result) {
        debug!(%symbol, reason, "filtered out");
        return InstrumentOutcome::FilteredOut;
    }
    InstrumentOutcome::Included(Box::new(result))
}

/// Scan `universe` with the mode and filters of `config`.
///
/// `observer` receives a progress event for every processed instrument and a
/// match event for every included result. Setting `cancel` stops the scan
/// before the next instrument; already included results are kept.
pub fn run_scan(
    config: &ScanConfig,
    universe: &[InstrumentId],
    sources: ScanSources<'_>,
    observer: &dyn ScanObserver,
    cancel: Option<&AtomicBool>,
) -> Result<ScanReport, ScanError> {
    config.validate()?;
    if universe.is_empty() {
        return Err(ScanError::UniverseUnavailable(
            "resolved universe is empty".into(),
        ));
    }

    let config = config.pinned();
    let scan_id = config.scan_id();
    let as_of = config.resolved_as_of();
    let total = universe.len();
    let started = Instant::now();

    info!(
        mode = %config.mode,
        %as_of,
        instruments = total,
        workers = config.workers,
        "starting scan {}",
        &scan_id[..12]
    );

    let thread_pool = if config.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .build()
                .map_err(|e| ScanError::ThreadPool(e.to_string()))?,
        )
    } else {
        None
    };

    let accumulator: Mutex<Vec<ScanResult>> = Mutex::new(Vec::new());
    let counters = Counters::default();

    let process = |(index, id): (usize, &InstrumentId)| {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            evaluate_instrument(index, id, &config, sources)
        }))
        .unwrap_or_else(|_| {
            warn!(symbol = %id.symbol(), "instrument pipeline panicked, skipping");
            InstrumentOutcome::SkippedNoData
        });
        counters.record(&outcome);

        let found = match outcome {
            InstrumentOutcome::Included(result) => {
                let found = {
                    let mut acc = lock(&accumulator);
                    acc.push((*result).clone());
                    counters.found.fetch_add(1, Ordering::Relaxed) + 1
                };
                observer.on_match(&result, found);
                found
            }
            _ => counters.found.load(Ordering::Relaxed),
        };

        let processed = counters.processed.fetch_add(1, Ordering::Relaxed) + 1;
        observer.on_progress(&ScanProgress {
            index: processed,
            total,
            instrument: id.clone(),
            found,
        });
    };

    if let Some(ref tp) = thread_pool {
        tp.install(|| universe.par_iter().enumerate().for_each(&process));
    } else {
        universe.iter().enumerate().for_each(&process);
    }

    let mut results = accumulator
        .into_inner()
        .unwrap_or_else(|e| e.into_inner());
    sort_results(&mut results);

    let stats = counters.snapshot(total);
    let cancelled = stats.processed < total;
    let elapsed = started.elapsed();
    observer.on_complete(&stats);

    if cancelled {
        warn!(
            processed = stats.processed,
            total, "scan cancelled, returning partial results"
        );
    }
    info!(
        found = stats.found,
        skipped = stats.skipped(),
        no_match = stats.no_match,
        filtered_out = stats.filtered_out,
        elapsed_ms = elapsed.as_millis() as u64,
        "scan finished"
    );

    Ok(ScanReport {
        scan_id,
        mode: config.mode,
        as_of,
        results,
        stats,
        elapsed,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ScanFilters;
    use crate::progress::NullObserver;
    use macdscan_core::data::{DataError, SyntheticProvider};
    use macdscan_core::dividend::DividendEvent;
    use macdscan_core::domain::{Market, PriceSeries};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn config(workers: usize) -> ScanConfig {
        ScanConfig {
            workers,
            as_of: Some(as_of()),
            filters: ScanFilters::permissive(),
            ..ScanConfig::default()
        }
    }

    fn universe(n: usize) -> Vec<InstrumentId> {
        (0..n)
            .map(|i| InstrumentId::new(format!("{}", 1101 + i), Market::Primary, ""))
            .collect()
    }

    struct NoPrices;

    impl PriceSource for NoPrices {
        fn name(&self) -> &str {
            "none"
        }

        fn fetch_monthly(
            &self,
            id: &InstrumentId,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<PriceSeries, DataError> {
            Err(DataError::SymbolNotFound {
                symbol: id.symbol(),
            })
        }

        fn fetch_recent_close(&self, id: &InstrumentId, _: NaiveDate) -> Result<f64, DataError> {
            Err(DataError::NoRecentClose {
                symbol: id.symbol(),
            })
        }
    }

    struct NoDividends;

    impl DividendSource for NoDividends {
        fn fetch_dividends(&self, _: &InstrumentId) -> Result<Vec<DividendEvent>, DataError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn empty_universe_is_fatal() {
        let provider = SyntheticProvider::new(as_of());
        let err = run_scan(
            &config(1),
            &[],
            ScanSources::new(&provider, &provider),
            &NullObserver,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::UniverseUnavailable(_)));
    }

    #[test]
    fn invalid_config_is_fatal() {
        let provider = SyntheticProvider::new(as_of());
        let err = run_scan(
            &config(0),
            &universe(3),
            ScanSources::new(&provider, &provider),
            &NullObserver,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn fetch_failures_are_skips() {
        let report = run_scan(
            &config(1),
            &universe(5),
            ScanSources::new(&NoPrices, &NoDividends),
            &NullObserver,
            None,
        )
        .unwrap();
        assert!(report.is_empty());
        assert!(!report.cancelled);
        assert_eq!(report.stats.processed, 5);
        assert_eq!(report.stats.skipped_no_data, 5);
    }

    #[test]
    fn outcomes_partition_the_universe() {
        let provider = SyntheticProvider::new(as_of());
        let report = run_scan(
            &config(1),
            &universe(40),
            ScanSources::new(&provider, &provider),
            &NullObserver,
            None,
        )
        .unwrap();
        let s = &report.stats;
        assert_eq!(s.processed, 40);
        assert_eq!(
            s.skipped_no_data + s.skipped_insufficient_history + s.no_match + s.filtered_out + s.found,
            40
        );
        assert_eq!(s.found, report.results.len());
    }

    struct CountingDividends<'a> {
        inner: &'a SyntheticProvider,
        calls: AtomicUsize,
    }

    impl DividendSource for CountingDividends<'_> {
        fn fetch_dividends(&self, id: &InstrumentId) -> Result<Vec<DividendEvent>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_dividends(id)
        }
    }

    #[test]
    fn dividends_fetched_only_for_matches() {
        let provider = SyntheticProvider::new(as_of());
        let dividends = CountingDividends {
            inner: &provider,
            calls: AtomicUsize::new(0),
        };
        let report = run_scan(
            &config(4),
            &universe(60),
            ScanSources::new(&provider, &dividends),
            &NullObserver,
            None,
        )
        .unwrap();

        let stats = report.stats;
        assert!(stats.no_match > 0, "universe should contain non-matching instruments");
        assert_eq!(
            dividends.calls.load(Ordering::SeqCst),
            stats.filtered_out + stats.found
        );
    }

    #[test]
    fn scan_id_is_stable_for_pinned_config() {
        let provider = SyntheticProvider::new(as_of());
        let sources = ScanSources::new(&provider, &provider);
        let a = run_scan(&config(1), &universe(3), sources, &NullObserver, None).unwrap();
        let b = run_scan(&config(1), &universe(3), sources, &NullObserver, None).unwrap();
        assert_eq!(a.scan_id, b.scan_id);
        assert_eq!(a.scan_id, config(1).scan_id());
    }
}
