//! Bearish shrink: a negative histogram losing magnitude.
//!
//! Match at bar t when hist[t] < 0, hist[t-1] < 0 and |hist[t]| < |hist[t-1]|.
//! shrink magnitude = |hist[t-1]| - |hist[t]|
//! shrink percent = magnitude / |hist[t-1]| * 100
//! Confirmations: MACD > 0, K > D, K < 30, RSI < 50, so strength ranges over [0, 4].
//! Needs three computed periods, so the earliest evaluable bar is index 2.

use super::{common_confirmations, DetectionMode, MacdLevel, SignalDetail, SignalRecord, SignalRule};
use crate::indicators::IndicatorSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct BearishShrink;

impl SignalRule for BearishShrink {
    fn name(&self) -> &str {
        "bearish_shrink"
    }

    fn min_periods(&self) -> usize {
        3
    }

    fn evaluate(&self, indicators: &IndicatorSet, index: usize) -> Option<SignalRecord> {
        if index + 1 < self.min_periods() {
            return None;
        }
        let prior = indicators.point(index - 1)?;
        let current = indicators.point(index)?;

        let (prev_hist, curr_hist) = (prior.histogram, current.histogram);
        if !prev_hist.is_finite() || !curr_hist.is_finite() {
            return None;
        }
        if !(curr_hist < 0.0 && prev_hist < 0.0 && curr_hist.abs() < prev_hist.abs()) {
            return None;
        }

        let magnitude = prev_hist.abs() - curr_hist.abs();
        let percent = magnitude / prev_hist.abs() * 100.0;

        Some(SignalRecord {
            mode: DetectionMode::BearishShrink,
            index,
            current,
            prior,
            level: MacdLevel::from_macd(current.macd),
            confirmations: common_confirmations(&current),
            detail: SignalDetail::Shrink { magnitude, percent },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use crate::signal::{set_from_pairs, Confirmation};

    /// Pairs whose histogram equals `hist` with MACD fixed at `macd`.
    fn pairs_for(hist: &[f64], macd: f64) -> Vec<(f64, f64)> {
        hist.iter().map(|h| (macd, macd - h)).collect()
    }

    #[test]
    fn shrinking_negative_histogram_matches() {
        // histogram -10, -10, -6 → magnitude 4, percent 40
        let set = set_from_pairs(&pairs_for(&[-10.0, -10.0, -6.0], -1.0), 50.0, 50.0, 60.0);
        let rec = BearishShrink.evaluate(&set, 2).expect("shrink");
        assert_approx(rec.shrink_magnitude().unwrap(), 4.0, DEFAULT_EPSILON);
        assert_approx(rec.shrink_percent().unwrap(), 40.0, DEFAULT_EPSILON);
        assert!(rec.crossover_magnitude().is_none());
    }

    #[test]
    fn growing_negative_histogram_does_not_match() {
        // histogram -10, -10, -12
        let set = set_from_pairs(&pairs_for(&[-10.0, -10.0, -12.0], -1.0), 50.0, 50.0, 60.0);
        assert!(BearishShrink.evaluate(&set, 2).is_none());
    }

    #[test]
    fn unchanged_histogram_does_not_match() {
        let set = set_from_pairs(&pairs_for(&[-3.0, -3.0, -3.0], -1.0), 50.0, 50.0, 60.0);
        assert!(BearishShrink.evaluate(&set, 2).is_none());
    }

    #[test]
    fn crossing_to_positive_is_not_a_shrink() {
        let set = set_from_pairs(&pairs_for(&[-4.0, -3.0, 0.5], -1.0), 50.0, 50.0, 60.0);
        assert!(BearishShrink.evaluate(&set, 2).is_none());
    }

    #[test]
    fn zero_histogram_is_not_negative() {
        let set = set_from_pairs(&pairs_for(&[-4.0, -3.0, 0.0], -1.0), 50.0, 50.0, 60.0);
        assert!(BearishShrink.evaluate(&set, 2).is_none());
    }

    #[test]
    fn needs_three_periods() {
        let set = set_from_pairs(&pairs_for(&[-4.0, -1.0], -1.0), 50.0, 50.0, 60.0);
        assert!(BearishShrink.evaluate(&set, 1).is_none());
    }

    #[test]
    fn confirmations_and_level() {
        // MACD above zero while histogram shrinks below zero; K > D, K < 30, RSI < 50
        let set = set_from_pairs(&pairs_for(&[-5.0, -4.0, -1.0], 2.0), 20.0, 10.0, 45.0);
        let rec = BearishShrink.evaluate(&set, 2).expect("shrink");
        assert_eq!(rec.level, MacdLevel::Bullish);
        assert_eq!(rec.strength(), 4);
        assert!(rec.has(Confirmation::MacdPositive));
        assert!(!rec.has(Confirmation::HistogramTurnedPositive));
        assert_approx(rec.shrink_percent().unwrap(), 75.0, DEFAULT_EPSILON);
    }
}
