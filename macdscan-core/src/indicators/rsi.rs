//! Relative Strength Index (RSI), rolling-mean variant.
//!
//! Average gain and average loss are simple rolling means over the trailing
//! `period` close-to-close changes (not Wilder smoothing). The change at bar 0 is
//! undefined and counts as zero gain and zero loss.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period - 1.
//! Edge cases: avg_loss == 0 → RSI = 100; both averages zero → RSI = 50.

use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period }
    }

    pub fn lookback(&self) -> usize {
        self.period - 1
    }

    pub fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.compute_closes(&closes)
    }

    pub fn compute_closes(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];

        let mut gains = vec![0.0; n];
        let mut losses = vec![0.0; n];
        for i in 1..n {
            let change = closes[i] - closes[i - 1];
            if change.is_nan() {
                gains[i] = f64::NAN;
                losses[i] = f64::NAN;
            } else if change > 0.0 {
                gains[i] = change;
            } else {
                losses[i] = -change;
            }
        }

        for i in self.lookback()..n {
            let start = i + 1 - self.period;
            let gain_sum: f64 = gains[start..=i].iter().sum();
            let loss_sum: f64 = losses[start..=i].iter().sum();
            if gain_sum.is_nan() || loss_sum.is_nan() {
                continue;
            }
            let period = self.period as f64;
            result[i] = compute_rsi(gain_sum / period, loss_sum / period);
        }

        result
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(14)
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains() {
        let rsi = Rsi::new(3).compute(&make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]));
        assert_approx(rsi[2], 100.0, 1e-9);
        assert_approx(rsi[4], 100.0, 1e-9);
    }

    #[test]
    fn rsi_all_losses() {
        let rsi = Rsi::new(3).compute(&make_bars(&[105.0, 104.0, 103.0, 102.0]));
        assert_approx(rsi[3], 0.0, 1e-9);
    }

    #[test]
    fn rsi_flat_is_50() {
        let rsi = Rsi::new(3).compute(&make_bars(&[10.0; 5]));
        assert_approx(rsi[4], 50.0, 1e-9);
    }

    #[test]
    fn rsi_warmup_counts_first_bar_as_zero_change() {
        // period 3 → first value at index 2 from changes [0, +2, -1]
        // avg_gain = 2/3, avg_loss = 1/3 → RS = 2 → RSI = 100 - 100/3
        let rsi = Rsi::new(3).compute(&make_bars(&[10.0, 12.0, 11.0]));
        assert!(rsi[0].is_nan());
        assert!(rsi[1].is_nan());
        assert_approx(rsi[2], 100.0 - 100.0 / 3.0, 1e-9);
    }

    #[test]
    fn rsi_uses_simple_rolling_mean() {
        // period 2, closes 10, 14, 12, 13
        // index 3 window covers changes [-2, +1] → gain 0.5, loss 1.0 → RSI = 100 - 100/1.5
        let rsi = Rsi::new(2).compute(&make_bars(&[10.0, 14.0, 12.0, 13.0]));
        assert_approx(rsi[3], 100.0 - 100.0 / 1.5, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let result = Rsi::new(3).compute(&bars);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds at bar {i}: {v}");
            }
        }
    }

    #[test]
    fn rsi_nan_close_poisons_window() {
        let rsi = Rsi::new(2).compute_closes(&[10.0, f64::NAN, 12.0, 13.0, 14.0]);
        assert!(rsi[1].is_nan());
        assert!(rsi[2].is_nan());
        assert!(!rsi[4].is_nan());
    }
}
