//! Stochastic oscillator (K/D).
//!
//! RSV[t] = 100 * (close[t] - lowest_low) / (highest_high - lowest_low) over the
//! trailing `period` bars. K = EMA(RSV, k_smoothing), D = EMA(K, d_smoothing).
//! Lookback: period - 1 (RSV, K and D are NaN before that).
//! Edge case: highest_high == lowest_low → RSV = 50.

use super::ema::ema_of_series;
use crate::domain::PriceBar;

/// RSV used when the rolling range collapses to zero.
pub const FLAT_RANGE_RSV: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    k_smoothing: usize,
    d_smoothing: usize,
}

impl Stochastic {
    pub fn new(period: usize, k_smoothing: usize, d_smoothing: usize) -> Self {
        assert!(period >= 1, "stochastic period must be >= 1");
        assert!(k_smoothing >= 1, "K smoothing must be >= 1");
        assert!(d_smoothing >= 1, "D smoothing must be >= 1");
        Self {
            period,
            k_smoothing,
            d_smoothing,
        }
    }

    pub fn lookback(&self) -> usize {
        self.period - 1
    }

    /// Raw stochastic value per bar.
    pub fn rsv(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        for i in self.lookback()..n {
            let window = &bars[i + 1 - self.period..=i];
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let highest = window
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let close = bars[i].close;

            if close.is_nan() || !lowest.is_finite() || !highest.is_finite() {
                continue;
            }
            let range = highest - lowest;
            result[i] = if range == 0.0 {
                FLAT_RANGE_RSV
            } else {
                100.0 * (close - lowest) / range
            };
        }

        result
    }

    pub fn compute(&self, bars: &[PriceBar]) -> StochasticSeries {
        let rsv = self.rsv(bars);
        let k = ema_of_series(&rsv, self.k_smoothing);
        let d = ema_of_series(&k, self.d_smoothing);
        StochasticSeries { k, d }
    }
}

impl Default for Stochastic {
    fn default() -> Self {
        Self::new(9, 3, 3)
    }
}
