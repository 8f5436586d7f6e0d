//! First bullish crossover: MACD crosses above its signal line.
//!
//! Match at bar t when MACD[t] > signal[t] and MACD[t-1] <= signal[t-1].
//! Equivalent to the histogram turning from non-positive to positive.
//! Confirmations: MACD > 0, K > D, K < 30, RSI < 50, histogram > 0.
//! The histogram confirmation always holds on a crossover bar, so strength
//! ranges over [1, 5].

use super::{
    common_confirmations, Confirmation, DetectionMode, MacdLevel, SignalDetail, SignalRecord,
    SignalRule,
};
use crate::indicators::IndicatorSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstBullishCrossover;

impl SignalRule for FirstBullishCrossover {
    fn name(&self) -> &str {
        "first_bullish_crossover"
    }

    fn min_periods(&self) -> usize {
        2
    }

    fn evaluate(&self, indicators: &IndicatorSet, index: usize) -> Option<SignalRecord> {
        if index == 0 {
            return None;
        }
        let prior = indicators.point(index - 1)?;
        let current = indicators.point(index)?;

        let values = [current.macd, current.signal, prior.macd, prior.signal];
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let crossed = current.macd > current.signal && prior.macd <= prior.signal;
        if !crossed {
            return None;
        }

        let mut confirmations = common_confirmations(&current);
        if current.histogram > 0.0 {
            confirmations.push(Confirmation::HistogramTurnedPositive);
        }

        Some(SignalRecord {
            mode: DetectionMode::FirstBullishCrossover,
            index,
            current,
            prior,
            level: MacdLevel::from_macd(current.macd),
            confirmations,
            detail: SignalDetail::Crossover {
                magnitude: current.macd - current.signal,
            },
        })
    }
}
