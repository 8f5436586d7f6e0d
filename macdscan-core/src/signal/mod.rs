//! Momentum-transition signal detection.
//!
//! A scan session selects one [`DetectionMode`]. Each mode is a [`SignalRule`]
//! that evaluates an [`IndicatorSet`] at a bar index against the bar(s) before
//! it. Rules are window-position agnostic: the scanner evaluates the latest bar,
//! [`detect_history`] evaluates every bar.
//!
//! Confirmations are secondary conditions that corroborate a match; a record's
//! strength is the number of confirmations it carries.

pub mod crossover;
pub mod shrink;

pub use crossover::FirstBullishCrossover;
pub use shrink::BearishShrink;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::indicators::{IndicatorPoint, IndicatorSet};

/// K below this level counts as oversold.
pub const STOCH_OVERSOLD: f64 = 30.0;

/// RSI below this level counts as weak momentum.
pub const RSI_MIDLINE: f64 = 50.0;

/// One corroborating condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    MacdPositive,
    StochasticBullishCross,
    StochasticOversold,
    RsiBelowMidline,
    HistogramTurnedPositive,
}

impl Confirmation {
    pub fn label(&self) -> &'static str {
        match self {
            Confirmation::MacdPositive => "MACD>0",
            Confirmation::StochasticBullishCross => "K>D",
            Confirmation::StochasticOversold => "K<30",
            Confirmation::RsiBelowMidline => "RSI<50",
            Confirmation::HistogramTurnedPositive => "HIST>0",
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether MACD sits above or below the zero line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdLevel {
    Bullish,
    Bearish,
}

impl MacdLevel {
    pub fn from_macd(macd: f64) -> Self {
        if macd > 0.0 {
            MacdLevel::Bullish
        } else {
            MacdLevel::Bearish
        }
    }
}

impl fmt::Display for MacdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacdLevel::Bullish => f.write_str("bullish"),
            MacdLevel::Bearish => f.write_str("bearish"),
        }
    }
}

/// Mode-specific numbers attached to a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    /// MACD - signal on the crossover bar.
    Crossover { magnitude: f64 },
    /// |prior histogram| - |current histogram|, and that as a percentage of |prior|.
    Shrink { magnitude: f64, percent: f64 },
}

/// Outcome of a successful rule evaluation.
///
/// A rule returns `None` when it does not match, so holding a record means the
/// rule matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub mode: DetectionMode,
    /// Bar index the record was evaluated at.
    pub index: usize,
    pub current: IndicatorPoint,
    pub prior: IndicatorPoint,
    pub level: MacdLevel,
    pub confirmations: Vec<Confirmation>,
    pub detail: SignalDetail,
}

impl SignalRecord {
    /// Number of confirmations.
    pub fn strength(&self) -> u8 {
        self.confirmations.len() as u8
    }

    pub fn has(&self, confirmation: Confirmation) -> bool {
        self.confirmations.contains(&confirmation)
    }

    pub fn crossover_magnitude(&self) -> Option<f64> {
        match self.detail {
            SignalDetail::Crossover { magnitude } => Some(magnitude),
            SignalDetail::Shrink { .. } => None,
        }
    }

    pub fn shrink_magnitude(&self) -> Option<f64> {
        match self.detail {
            SignalDetail::Shrink { magnitude, .. } => Some(magnitude),
            SignalDetail::Crossover { .. } => None,
        }
    }

    pub fn shrink_percent(&self) -> Option<f64> {
        match self.detail {
            SignalDetail::Shrink { percent, .. } => Some(percent),
            SignalDetail::Crossover { .. } => None,
        }
    }

    /// Secondary sort key: crossover magnitude for Mode A, shrink magnitude for Mode B.
    pub fn sort_magnitude(&self) -> f64 {
        match self.detail {
            SignalDetail::Crossover { magnitude } => magnitude,
            SignalDetail::Shrink { magnitude, .. } => magnitude,
        }
    }

    /// Comma-joined confirmation labels, or a mode-specific placeholder when empty.
    pub fn confirmation_summary(&self) -> String {
        if self.confirmations.is_empty() {
            return match self.mode {
                DetectionMode::FirstBullishCrossover => "crossover only".into(),
                DetectionMode::BearishShrink => "shrink only".into(),
            };
        }
        self.confirmations
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Trait for detection rules.
///
/// Rules see only the indicator columns and a bar index; they carry no state
/// between evaluations.
pub trait SignalRule: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum number of computed periods needed to evaluate.
    fn min_periods(&self) -> usize;

    /// Evaluate the rule at `index` (compared against earlier bars).
    fn evaluate(&self, indicators: &IndicatorSet, index: usize) -> Option<SignalRecord>;
}

/// The closed set of detection strategies a scan can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// Histogram turns from non-positive to positive ("first red bar").
    FirstBullishCrossover,
    /// Negative histogram shrinks in magnitude ("green bar shrinking").
    BearishShrink,
}

impl DetectionMode {
    pub fn rule(&self) -> &'static dyn SignalRule {
        match self {
            DetectionMode::FirstBullishCrossover => &FirstBullishCrossover,
            DetectionMode::BearishShrink => &BearishShrink,
        }
    }

    pub fn detect(&self, indicators: &IndicatorSet, index: usize) -> Option<SignalRecord> {
        self.rule().evaluate(indicators, index)
    }

    /// Upper bound on strength for this mode.
    pub fn max_strength(&self) -> u8 {
        match self {
            DetectionMode::FirstBullishCrossover => 5,
            DetectionMode::BearishShrink => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::FirstBullishCrossover => "first-bullish-crossover",
            DetectionMode::BearishShrink => "bearish-shrink",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-bullish-crossover" | "crossover" => Ok(DetectionMode::FirstBullishCrossover),
            "bearish-shrink" | "shrink" => Ok(DetectionMode::BearishShrink),
            other => Err(format!(
                "unknown detection mode '{other}'. Valid: first-bullish-crossover, bearish-shrink"
            )),
        }
    }
}

/// Evaluate the mode at the latest bar.
pub fn detect_latest(mode: DetectionMode, indicators: &IndicatorSet) -> Option<SignalRecord> {
    let last = indicators.len().checked_sub(1)?;
    mode.detect(indicators, last)
}

/// Evaluate the mode at every bar and return all matches in bar order.
pub fn detect_history(mode: DetectionMode, indicators: &IndicatorSet) -> Vec<SignalRecord> {
    (0..indicators.len())
        .filter_map(|i| mode.detect(indicators, i))
        .collect()
}

/// Confirmations shared by both modes, evaluated on the current point.
///
/// NaN K/D/RSI (warm-up) fail their comparisons and contribute nothing.
pub(crate) fn common_confirmations(point: &IndicatorPoint) -> Vec<Confirmation> {
    let mut confirmations = Vec::with_capacity(5);
    if point.macd > 0.0 {
        confirmations.push(Confirmation::MacdPositive);
    }
    if point.k > point.d {
        confirmations.push(Confirmation::StochasticBullishCross);
    }
    if point.k < STOCH_OVERSOLD {
        confirmations.push(Confirmation::StochasticOversold);
    }
    if point.rsi < RSI_MIDLINE {
        confirmations.push(Confirmation::RsiBelowMidline);
    }
    confirmations
}

/// Build an `IndicatorSet` directly from MACD/signal pairs and oscillator values.
///
/// Used by tests to exercise rules on exact histogram sequences.
#[cfg(test)]
pub(crate) fn set_from_pairs(pairs: &[(f64, f64)], k: f64, d: f64, rsi: f64) -> IndicatorSet {
    use crate::indicators::{MacdSeries, StochasticSeries};
    let n = pairs.len();
    IndicatorSet {
        macd: MacdSeries {
            macd: pairs.iter().map(|p| p.0).collect(),
            signal: pairs.iter().map(|p| p.1).collect(),
            histogram: pairs.iter().map(|p| p.0 - p.1).collect(),
        },
        stochastic: StochasticSeries {
            k: vec![k; n],
            d: vec![d; n],
        },
        rsi: vec![rsi; n],
    }
}
