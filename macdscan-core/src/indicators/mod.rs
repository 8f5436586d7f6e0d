//! Monthly indicator engine: MACD, stochastic K/D and rolling-mean RSI.
//!
//! Indicators are pure functions of the full bar series. They are computed once
//! per evaluation over the whole series (no incremental state carried between
//! scans) and every output has the same length as the input.
//!
//! No value at bar t may depend on bars after t; `tests/lookahead_test.rs`
//! checks this by comparing truncated and full computations.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stochastic;

pub use ema::ema_of_series;
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use stochastic::{Stochastic, StochasticSeries};

use serde::{Deserialize, Serialize};

use crate::domain::{PriceBar, PriceSeries};

/// Periods for all three indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_period: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_period: 9,
            stoch_k: 3,
            stoch_d: 3,
            rsi_period: 14,
        }
    }
}

impl IndicatorParams {
    /// Check the invariants the indicator constructors assert on.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("macd_fast", self.macd_fast),
            ("macd_signal", self.macd_signal),
            ("stoch_period", self.stoch_period),
            ("stoch_k", self.stoch_k),
            ("stoch_d", self.stoch_d),
            ("rsi_period", self.rsi_period),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(format!("{name} must be >= 1"));
            }
        }
        if self.macd_slow <= self.macd_fast {
            return Err(format!(
                "macd_slow ({}) must be greater than macd_fast ({})",
                self.macd_slow, self.macd_fast
            ));
        }
        Ok(())
    }
}

/// Derived values for a single period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub k: f64,
    pub d: f64,
    pub rsi: f64,
}

/// Full indicator columns for one series, positionally aligned with its bars.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub macd: MacdSeries,
    pub stochastic: StochasticSeries,
    pub rsi: Vec<f64>,
}

impl IndicatorSet {
    /// Compute every indicator over the full series.
    pub fn compute(series: &PriceSeries, params: &IndicatorParams) -> Self {
        Self::compute_bars(series.bars(), params)
    }

    pub fn compute_bars(bars: &[PriceBar], params: &IndicatorParams) -> Self {
        let macd = Macd::new(params.macd_fast, params.macd_slow, params.macd_signal).compute(bars);
        let stochastic =
            Stochastic::new(params.stoch_period, params.stoch_k, params.stoch_d).compute(bars);
        let rsi = Rsi::new(params.rsi_period).compute(bars);
        Self {
            macd,
            stochastic,
            rsi,
        }
    }

    pub fn len(&self) -> usize {
        self.macd.macd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn point(&self, index: usize) -> Option<IndicatorPoint> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorPoint {
            macd: self.macd.macd[index],
            signal: self.macd.signal[index],
            histogram: self.macd.histogram[index],
            k: self.stochastic.k[index],
            d: self.stochastic.d[index],
            rsi: self.rsi[index],
        })
    }

    pub fn latest(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }

    pub fn points(&self) -> Vec<IndicatorPoint> {
        (0..self.len()).filter_map(|i| self.point(i)).collect()
    }
}

/// Create synthetic monthly bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1.0,
/// low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Months::new(i as u32),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
