//! Integration tests for the scan loop.
//!
//! Uses the synthetic provider (deterministic per symbol) wrapped in sources
//! that fail, panic or stall on purpose.
//! Tests: partial-failure complement, progress completeness, panic
//! containment, cancellation, degraded enrichment, and equality of sequential
//! and parallel results.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use macdscan_core::data::{DataError, DividendSource, PriceSource, StaticUniverse, SyntheticProvider};
use macdscan_core::dividend::{summarize_dividends, DividendEvent};
use macdscan_core::domain::{InstrumentId, PriceSeries};
use macdscan_core::signal::DetectionMode;
use macdscan_runner::{
    run_scan, NullObserver, ScanConfig, ScanFilters, ScanObserver, ScanProgress, ScanResult,
    ScanSources, ScanStats,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn universe() -> Vec<InstrumentId> {
    StaticUniverse::preset().instruments().to_vec()
}

fn config(mode: DetectionMode, workers: usize) -> ScanConfig {
    ScanConfig {
        mode,
        workers,
        as_of: Some(as_of()),
        filters: ScanFilters::permissive(),
        ..ScanConfig::default()
    }
}

/// Synthetic prices, failing for a fixed set of symbols.
struct FlakyPrices {
    inner: SyntheticProvider,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    recent_close_fails: bool,
}

impl FlakyPrices {
    fn healthy() -> Self {
        Self {
            inner: SyntheticProvider::new(as_of()),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            recent_close_fails: false,
        }
    }
}

impl PriceSource for FlakyPrices {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch_monthly(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let symbol = id.symbol();
        if self.panicking.contains(&symbol) {
            panic!("malformed payload for {symbol}");
        }
        if self.failing.contains(&symbol) {
            return Err(DataError::NetworkUnreachable(format!("timeout fetching {symbol}")));
        }
        self.inner.fetch_monthly(id, start, end)
    }

    fn fetch_recent_close(&self, id: &InstrumentId, as_of: NaiveDate) -> Result<f64, DataError> {
        if self.recent_close_fails {
            return Err(DataError::NoRecentClose {
                symbol: id.symbol(),
            });
        }
        self.inner.fetch_recent_close(id, as_of)
    }
}

struct FailingDividends;

impl DividendSource for FailingDividends {
    fn fetch_dividends(&self, id: &InstrumentId) -> Result<Vec<DividendEvent>, DataError> {
        Err(DataError::SymbolNotFound {
            symbol: id.symbol(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<ScanProgress>>,
    matches: AtomicUsize,
    completed: Mutex<Option<ScanStats>>,
    cancel_after: Option<(usize, &'static AtomicBool)>,
}

impl ScanObserver for Recorder {
    fn on_progress(&self, progress: &ScanProgress) {
        let mut seen = self.progress.lock().unwrap();
        seen.push(progress.clone());
        if let Some((n, flag)) = self.cancel_after {
            if seen.len() >= n {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }

    fn on_match(&self, _result: &ScanResult, _found: usize) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    fn on_complete(&self, stats: &ScanStats) {
        *self.completed.lock().unwrap() = Some(stats.clone());
    }
}

fn symbols(results: &[ScanResult]) -> Vec<String> {
    let mut s: Vec<String> = results.iter().map(|r| r.instrument.symbol()).collect();
    s.sort();
    s
}

// ──────────────────────────────────────────────
// 1. Partial failure
// ──────────────────────────────────────────────

#[test]
fn thirty_percent_failures_keep_the_other_seventy() {
    let all = universe();
    let failing: HashSet<String> = all
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 10 < 3)
        .map(|(_, id)| id.symbol())
        .collect();
    let healthy_universe: Vec<InstrumentId> = all
        .iter()
        .filter(|id| !failing.contains(&id.symbol()))
        .cloned()
        .collect();

    let flaky = FlakyPrices {
        failing: failing.clone(),
        ..FlakyPrices::healthy()
    };
    let synthetic = SyntheticProvider::new(as_of());
    let cfg = config(DetectionMode::BearishShrink, 4);

    let recorder = Recorder::default();
    let report = run_scan(
        &cfg,
        &all,
        ScanSources::new(&flaky, &synthetic),
        &recorder,
        None,
    )
    .unwrap();

    let reference = run_scan(
        &cfg,
        &healthy_universe,
        ScanSources::new(&synthetic, &synthetic),
        &NullObserver,
        None,
    )
    .unwrap();

    assert!(!reference.is_empty(), "synthetic universe should produce shrink matches");
    assert_eq!(symbols(&report.results), symbols(&reference.results));
    assert_eq!(report.stats.skipped_no_data, failing.len());
    assert_eq!(report.stats.processed, all.len());
    assert!(!report.cancelled);

    // every instrument reported progress exactly once, ending at 100 %
    let progress = recorder.progress.lock().unwrap();
    assert_eq!(progress.len(), all.len());
    let max = progress.iter().map(|p| p.index).max().unwrap();
    assert_eq!(max, all.len());
    assert!(progress.iter().any(|p| (p.fraction() - 1.0).abs() < 1e-12));

    assert_eq!(recorder.matches.load(Ordering::Relaxed), report.results.len());
    assert_eq!(recorder.completed.lock().unwrap().as_ref(), Some(&report.stats));
}

#[test]
fn panicking_instrument_is_contained() {
    let all = universe();
    let panicking: HashSet<String> = all.iter().take(3).map(|id| id.symbol()).collect();
    let prices = FlakyPrices {
        panicking,
        ..FlakyPrices::healthy()
    };
    let synthetic = SyntheticProvider::new(as_of());

    for workers in [1, 4] {
        let report = run_scan(
            &config(DetectionMode::FirstBullishCrossover, workers),
            &all,
            ScanSources::new(&prices, &synthetic),
            &NullObserver,
            None,
        )
        .unwrap();
        assert_eq!(report.stats.processed, all.len());
        assert_eq!(report.stats.skipped_no_data, 3);
    }
}

// ──────────────────────────────────────────────
// 2. Degraded enrichment
// ──────────────────────────────────────────────

#[test]
fn dividend_failure_degrades_instead_of_skipping() {
    let prices = SyntheticProvider::new(as_of());
    let cfg = config(DetectionMode::BearishShrink, 1);

    let degraded = run_scan(
        &cfg,
        &universe(),
        ScanSources::new(&prices, &FailingDividends),
        &NullObserver,
        None,
    )
    .unwrap();
    let normal = run_scan(
        &cfg,
        &universe(),
        ScanSources::new(&prices, &prices),
        &NullObserver,
        None,
    )
    .unwrap();

    assert_eq!(symbols(&degraded.results), symbols(&normal.results));
    assert!(degraded
        .results
        .iter()
        .all(|r| !r.dividend.has_dividend && r.dividend.yield_pct == 0.0));

    // with the default dividend requirement nothing survives
    let strict = ScanConfig {
        filters: ScanFilters::default(),
        ..cfg
    };
    let report = run_scan(
        &strict,
        &universe(),
        ScanSources::new(&prices, &FailingDividends),
        &NullObserver,
        None,
    )
    .unwrap();
    assert!(report.is_empty());
    assert_eq!(report.stats.filtered_out, normal.results.len());
}

#[test]
fn recent_close_failure_falls_back_to_latest_close() {
    let prices = FlakyPrices {
        recent_close_fails: true,
        ..FlakyPrices::healthy()
    };
    let synthetic = SyntheticProvider::new(as_of());
    let report = run_scan(
        &config(DetectionMode::BearishShrink, 1),
        &universe(),
        ScanSources::new(&prices, &synthetic),
        &NullObserver,
        None,
    )
    .unwrap();

    for r in &report.results {
        let events = synthetic.fetch_dividends(&r.instrument).unwrap();
        let expected = summarize_dividends(&events, r.latest_close, as_of());
        assert_eq!(r.dividend, expected, "{}", r.instrument);
    }
}

// ──────────────────────────────────────────────
// 3. Cancellation
// ──────────────────────────────────────────────

static CANCEL_SEQUENTIAL: AtomicBool = AtomicBool::new(false);
static CANCEL_PARALLEL: AtomicBool = AtomicBool::new(false);

#[test]
fn cancellation_stops_sequential_scan() {
    let prices = SyntheticProvider::new(as_of());
    let recorder = Recorder {
        cancel_after: Some((10, &CANCEL_SEQUENTIAL)),
        ..Recorder::default()
    };
    let report = run_scan(
        &config(DetectionMode::BearishShrink, 1),
        &universe(),
        ScanSources::new(&prices, &prices),
        &recorder,
        Some(&CANCEL_SEQUENTIAL),
    )
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.stats.processed, 10);
    assert_eq!(report.results.len(), report.stats.found);
    assert!(report.results.iter().all(|r| r.universe_index < 10));
}

#[test]
fn cancellation_stops_parallel_scan() {
    let prices = SyntheticProvider::new(as_of());
    let recorder = Recorder {
        cancel_after: Some((5, &CANCEL_PARALLEL)),
        ..Recorder::default()
    };
    let total = universe().len();
    let report = run_scan(
        &config(DetectionMode::BearishShrink, 4),
        &universe(),
        ScanSources::new(&prices, &prices),
        &recorder,
        Some(&CANCEL_PARALLEL),
    )
    .unwrap();

    assert!(report.cancelled);
    assert!(report.stats.processed >= 5);
    assert!(report.stats.processed < total);
}

#[test]
fn preset_cancel_flag_processes_nothing() {
    let cancel = AtomicBool::new(true);
    let prices = SyntheticProvider::new(as_of());
    let report = run_scan(
        &config(DetectionMode::FirstBullishCrossover, 1),
        &universe(),
        ScanSources::new(&prices, &prices),
        &NullObserver,
        Some(&cancel),
    )
    .unwrap();
    assert!(report.cancelled);
    assert!(report.is_empty());
    assert_eq!(report.stats.processed, 0);
}

// ──────────────────────────────────────────────
// 4. Determinism across worker counts
// ──────────────────────────────────────────────

#[test]
fn parallel_results_equal_sequential() {
    let prices = SyntheticProvider::new(as_of());
    for mode in [DetectionMode::FirstBullishCrossover, DetectionMode::BearishShrink] {
        let runs: Vec<String> = [1, 2, 4, 8]
            .iter()
            .map(|&workers| {
                let report = run_scan(
                    &config(mode, workers),
                    &universe(),
                    ScanSources::new(&prices, &prices),
                    &NullObserver,
                    None,
                )
                .unwrap();
                serde_json::to_string(&report.results).unwrap()
            })
            .collect();
        assert!(runs.windows(2).all(|w| w[0] == w[1]), "{mode}: results differ by worker count");
    }
}

#[test]
fn results_are_sorted_for_presentation() {
    let prices = SyntheticProvider::new(as_of());
    let report = run_scan(
        &config(DetectionMode::BearishShrink, 4),
        &universe(),
        ScanSources::new(&prices, &prices),
        &NullObserver,
        None,
    )
    .unwrap();
    for pair in report.results.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.strength() >= b.strength());
        if a.strength() == b.strength() {
            assert!(a.signal.sort_magnitude() >= b.signal.sort_magnitude());
        }
    }
}
