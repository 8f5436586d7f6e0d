//! Trailing dividend enrichment.
//!
//! Events are deduplicated by date (a later record for the same date replaces an
//! earlier one), then summed over the 365 days ending at the as-of date.
//! Yield is expressed in percent of the reference close.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trailing window length in days.
pub const TRAILING_WINDOW_DAYS: i64 = 365;

/// Yields above this percentage are treated as data errors and zeroed.
pub const YIELD_SANITY_CEILING: f64 = 20.0;

/// One cash dividend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

impl DividendEvent {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendSummary {
    /// Sum of dividends paid in the trailing window.
    pub trailing_total: f64,
    pub has_dividend: bool,
    /// Trailing yield in percent; 0 when unavailable or implausible.
    pub yield_pct: f64,
}

impl DividendSummary {
    /// Degraded value used when dividend data cannot be fetched.
    pub fn unavailable() -> Self {
        Self {
            trailing_total: 0.0,
            has_dividend: false,
            yield_pct: 0.0,
        }
    }
}

impl Default for DividendSummary {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Summarize dividend events against a reference close as of a given date.
pub fn summarize_dividends(
    events: &[DividendEvent],
    reference_close: f64,
    as_of: NaiveDate,
) -> DividendSummary {
    // later insertions win
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in events {
        if event.amount.is_finite() {
            by_date.insert(event.date, event.amount);
        }
    }

    let window_start = as_of - Duration::days(TRAILING_WINDOW_DAYS);
    let trailing_total: f64 = by_date
        .range(window_start..=as_of)
        .map(|(_, amount)| amount)
        .sum();

    DividendSummary {
        trailing_total,
        has_dividend: trailing_total > 0.0,
        yield_pct: trailing_yield(trailing_total, reference_close),
    }
}

/// Yield percentage with the zero-close and sanity-ceiling fallbacks applied.
pub fn trailing_yield(total: f64, reference_close: f64) -> f64 {
    if !reference_close.is_finite() || reference_close <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    let pct = total / reference_close * 100.0;
    if pct > YIELD_SANITY_CEILING {
        0.0
    } else {
        pct
    }
}
