//! Property tests for indicator and detection invariants.
//!
//! Uses proptest to verify:
//! 1. Output columns are aligned with the input and bounded where defined
//! 2. Strength always equals the confirmation count, within the mode's range
//! 3. Dividend yield is never above the sanity ceiling or negative
//! 4. Prefix stability: appending a bar never changes earlier values

use chrono::{Duration, Months, NaiveDate};
use macdscan_core::dividend::{summarize_dividends, DividendEvent, YIELD_SANITY_CEILING};
use macdscan_core::domain::PriceBar;
use macdscan_core::indicators::{IndicatorParams, IndicatorSet};
use macdscan_core::signal::{detect_history, DetectionMode};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_returns(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.25..0.25_f64, min..max)
}

fn bars_from_returns(returns: &[f64]) -> Vec<PriceBar> {
    let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let mut price = 100.0_f64;
    returns
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let open = price;
            price = (price * (1.0 + r)).max(0.5);
            PriceBar {
                date: base + Months::new(i as u32),
                open,
                high: open.max(price) * 1.02,
                low: open.min(price) * 0.98,
                close: price,
            }
        })
        .collect()
}

fn arb_mode() -> impl Strategy<Value = DetectionMode> {
    prop_oneof![
        Just(DetectionMode::FirstBullishCrossover),
        Just(DetectionMode::BearishShrink),
    ]
}

// ── 1. Alignment and bounds ──────────────────────────────────────────

proptest! {
    #[test]
    fn columns_aligned_and_bounded(returns in arb_returns(12, 80)) {
        let bars = bars_from_returns(&returns);
        let set = IndicatorSet::compute_bars(&bars, &IndicatorParams::default());
        prop_assert_eq!(set.len(), bars.len());
        prop_assert_eq!(set.stochastic.k.len(), bars.len());
        prop_assert_eq!(set.rsi.len(), bars.len());

        for p in set.points() {
            prop_assert!(p.macd.is_finite());
            prop_assert!((p.histogram - (p.macd - p.signal)).abs() < 1e-9);
            if !p.k.is_nan() {
                prop_assert!((-1e-9..=100.0 + 1e-9).contains(&p.k));
            }
            if !p.rsi.is_nan() {
                prop_assert!((0.0..=100.0).contains(&p.rsi));
            }
        }
    }
}

// ── 2. Strength ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn strength_equals_confirmation_count(returns in arb_returns(12, 80), mode in arb_mode()) {
        let set = IndicatorSet::compute_bars(&bars_from_returns(&returns), &IndicatorParams::default());
        for hit in detect_history(mode, &set) {
            prop_assert_eq!(hit.strength() as usize, hit.confirmations.len());
            prop_assert!(hit.strength() <= mode.max_strength());
            if let Some(pct) = hit.shrink_percent() {
                prop_assert!(pct > 0.0 && pct <= 100.0);
            }
            if let Some(mag) = hit.crossover_magnitude() {
                prop_assert!(mag > 0.0);
            }
        }
    }
}

// ── 3. Dividend yield clamp ──────────────────────────────────────────

proptest! {
    #[test]
    fn yield_within_bounds(
        amounts in prop::collection::vec(0.0..50.0_f64, 0..6),
        close in -10.0..500.0_f64,
    ) {
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let events: Vec<DividendEvent> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| DividendEvent::new(as_of - Duration::days(30 * i as i64), *a))
            .collect();
        let s = summarize_dividends(&events, close, as_of);
        prop_assert!(s.yield_pct >= 0.0);
        prop_assert!(s.yield_pct <= YIELD_SANITY_CEILING);
        if close <= 0.0 {
            prop_assert_eq!(s.yield_pct, 0.0);
        }
        prop_assert_eq!(s.has_dividend, s.trailing_total > 0.0);
    }
}

// ── 4. Prefix stability ──────────────────────────────────────────────

proptest! {
    #[test]
    fn appending_a_bar_keeps_prefix(returns in arb_returns(13, 60)) {
        let bars = bars_from_returns(&returns);
        let params = IndicatorParams::default();
        let full = IndicatorSet::compute_bars(&bars, &params);
        let prefix = IndicatorSet::compute_bars(&bars[..bars.len() - 1], &params);
        for i in 0..prefix.len() {
            let (a, b) = (prefix.point(i).unwrap(), full.point(i).unwrap());
            prop_assert_eq!(a.macd.to_bits(), b.macd.to_bits());
            prop_assert_eq!(a.histogram.to_bits(), b.histogram.to_bits());
            prop_assert_eq!(a.k.is_nan(), b.k.is_nan());
            prop_assert_eq!(a.rsi.is_nan(), b.rsi.is_nan());
        }
    }
}
