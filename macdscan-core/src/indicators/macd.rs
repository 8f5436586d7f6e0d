//! Moving Average Convergence-Divergence (MACD).
//!
//! MACD line = EMA(close, fast) - EMA(close, slow)
//! Signal line = EMA(MACD line, signal)
//! Histogram = MACD line - signal line
//! All three series are valid from bar 0 because every EMA seeds on its first input.

use super::ema::ema_of_series;
use crate::domain::PriceBar;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1, "MACD fast span must be >= 1");
        assert!(slow > fast, "MACD slow span must be > fast span");
        assert!(signal >= 1, "MACD signal span must be >= 1");
        Self { fast, slow, signal }
    }

    pub fn compute(&self, bars: &[PriceBar]) -> MacdSeries {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.compute_closes(&closes)
    }

    pub fn compute_closes(&self, closes: &[f64]) -> MacdSeries {
        let ema_fast = ema_of_series(closes, self.fast);
        let ema_slow = ema_of_series(closes, self.slow);

        let macd: Vec<f64> = ema_fast
            .iter()
            .zip(&ema_slow)
            .map(|(f, s)| f - s)
            .collect();
        let signal = ema_of_series(&macd, self.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        MacdSeries {
            macd,
            signal,
            histogram,
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}
