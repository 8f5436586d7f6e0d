//! Price bars and the validated monthly series built from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of monthly bars needed before any indicator is computed.
///
/// Shorter series are rejected: the EMA warm-up and the rolling windows of the
/// stochastic and RSI calculations are not meaningful below this length.
pub const MIN_HISTORY_BARS: usize = 12;

/// OHLC bar for one period (one month for the scanner).
///
/// `date` is the period-end (or period-label) date reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high/low bracket open and close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("bar dates not strictly increasing at index {index} ({prev} -> {next})")]
    Unordered {
        index: usize,
        prev: NaiveDate,
        next: NaiveDate,
    },

    #[error("insufficient history: {bars} bars (need at least {required})")]
    InsufficientHistory { bars: usize, required: usize },
}

/// Time-ordered sequence of bars with strictly increasing dates.
///
/// Gaps are allowed (newly listed instruments have sparse months).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::Unordered {
                    index: i + 1,
                    prev: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Reject series shorter than [`MIN_HISTORY_BARS`].
    pub fn ensure_min_history(&self) -> Result<(), SeriesError> {
        if self.bars.len() < MIN_HISTORY_BARS {
            return Err(SeriesError::InsufficientHistory {
                bars: self.bars.len(),
                required: MIN_HISTORY_BARS,
            });
        }
        Ok(())
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar. A constructed series is never empty.
    pub fn latest(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Series restricted to the first `len` bars (for look-ahead checks and
    /// historical evaluation).
    pub fn truncated(&self, len: usize) -> Result<Self, SeriesError> {
        Self::new(self.bars[..len.min(self.bars.len())].to_vec())
    }
}
