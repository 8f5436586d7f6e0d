//! Data source traits and structured error types.
//!
//! Universe, price and dividend sources are separate traits so a scan can mix
//! implementations (a live listing with synthetic prices in tests, for example)
//! and so every collaborator can be mocked.

use chrono::NaiveDate;
use thiserror::Error;

use crate::dividend::DividendEvent;
use crate::domain::{InstrumentId, PriceBar, PriceSeries, SeriesError};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("invalid series for {symbol}: {source}")]
    InvalidSeries {
        symbol: String,
        #[source]
        source: SeriesError,
    },

    #[error("no recent close for {symbol}")]
    NoRecentClose { symbol: String },

    #[error("universe unavailable: {0}")]
    UniverseUnavailable(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of instrument lists.
pub trait UniverseSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<Vec<InstrumentId>, DataError>;
}

/// Source of monthly price history.
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Monthly bars for `id` between `start` and `end` (inclusive), oldest first.
    fn fetch_monthly(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError>;

    /// Most recent close on or before `as_of`, used as the dividend-yield reference.
    fn fetch_recent_close(&self, id: &InstrumentId, as_of: NaiveDate) -> Result<f64, DataError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Source of historical cash dividends.
pub trait DividendSource: Send + Sync {
    fn fetch_dividends(&self, id: &InstrumentId) -> Result<Vec<DividendEvent>, DataError>;
}

/// Drop bars without a finite close and build a validated series.
pub fn build_series(symbol: &str, bars: Vec<PriceBar>) -> Result<PriceSeries, DataError> {
    let bars: Vec<PriceBar> = bars.into_iter().filter(|b| b.close.is_finite()).collect();
    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    PriceSeries::new(bars).map_err(|source| DataError::InvalidSeries {
        symbol: symbol.to_string(),
        source,
    })
}
