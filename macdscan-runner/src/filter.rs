//! Inclusion filters and result ordering.
//!
//! The filters run eagerly inside the scan pipeline and can be re-applied to
//! an existing result list; both paths use [`ScanFilters::rejection`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use macdscan_core::signal::MacdLevel;

use crate::result::ScanResult;

/// Inclusion rules applied to every match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilters {
    /// Keep only matches whose MACD line is above zero.
    pub require_bullish_level: bool,
    /// Minimum shrink percentage; only applies to shrink matches.
    pub min_shrink_pct: f64,
    pub require_dividend: bool,
    /// Minimum trailing yield in percent; disabled when 0.
    pub min_yield: f64,
    pub min_strength: u8,
}

impl Default for ScanFilters {
    fn default() -> Self {
        Self {
            require_bullish_level: false,
            min_shrink_pct: 10.0,
            require_dividend: true,
            min_yield: 3.0,
            min_strength: 0,
        }
    }
}

impl ScanFilters {
    /// Filters that accept every match.
    pub fn permissive() -> Self {
        Self {
            require_bullish_level: false,
            min_shrink_pct: 0.0,
            require_dividend: false,
            min_yield: 0.0,
            min_strength: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.min_shrink_pct.is_finite() || !(0.0..=100.0).contains(&self.min_shrink_pct) {
            return Err(format!(
                "min_shrink_pct must be within [0, 100], got {}",
                self.min_shrink_pct
            ));
        }
        if !self.min_yield.is_finite() || self.min_yield < 0.0 {
            return Err(format!("min_yield must be >= 0, got {}", self.min_yield));
        }
        if self.min_strength > 5 {
            return Err(format!(
                "min_strength must be within [0, 5], got {}",
                self.min_strength
            ));
        }
        Ok(())
    }

    /// First rule the result fails, or `None` when it is accepted.
    ///
    /// Shrink percentages are compared at one decimal and yields at two, the
    /// precision they are reported with.
    pub fn rejection(&self, result: &ScanResult) -> Option<&'static str> {
        if self.require_bullish_level && result.signal.level != MacdLevel::Bullish {
            return Some("macd not positive");
        }
        if let Some(pct) = result.signal.shrink_percent() {
            if round_to(pct, 1) < self.min_shrink_pct {
                return Some("shrink below threshold");
            }
        }
        if self.require_dividend && !result.dividend.has_dividend {
            return Some("no dividend");
        }
        if self.min_yield > 0.0 && round_to(result.dividend.yield_pct, 2) < self.min_yield {
            return Some("yield below minimum");
        }
        if result.strength() < self.min_strength {
            return Some("strength below minimum");
        }
        None
    }

    pub fn accepts(&self, result: &ScanResult) -> bool {
        self.rejection(result).is_none()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Keep the results that pass `filters`, preserving order.
pub fn filter_results(results: Vec<ScanResult>, filters: &ScanFilters) -> Vec<ScanResult> {
    results.into_iter().filter(|r| filters.accepts(r)).collect()
}

/// Ordering used for presentation: strength desc, magnitude desc, universe index asc.
pub fn compare_results(a: &ScanResult, b: &ScanResult) -> Ordering {
    b.strength()
        .cmp(&a.strength())
        .then_with(|| {
            b.signal
                .sort_magnitude()
                .total_cmp(&a.signal.sort_magnitude())
        })
        .then_with(|| a.universe_index.cmp(&b.universe_index))
}

/// Stable sort into presentation order.
pub fn sort_results(results: &mut [ScanResult]) {
    results.sort_by(compare_results);
}
