//! macdscan core: domain types, monthly indicators, signal detection, dividend
//! enrichment and data sources.
//!
//! - Domain types (instrument identity, monthly bars, validated series)
//! - Indicator engine (MACD, stochastic K/D, RSI), stateless and look-ahead free
//! - Two detection modes behind the `SignalRule` trait
//! - Trailing dividend summary
//! - Universe, price and dividend source traits with Yahoo, exchange-listing and
//!   synthetic implementations

pub mod data;
pub mod dividend;
pub mod domain;
pub mod indicators;
pub mod signal;

pub use dividend::{summarize_dividends, DividendEvent, DividendSummary};
pub use domain::{InstrumentId, Market, PriceBar, PriceSeries, MIN_HISTORY_BARS};
pub use indicators::{IndicatorParams, IndicatorPoint, IndicatorSet};
pub use signal::{DetectionMode, SignalRecord};
