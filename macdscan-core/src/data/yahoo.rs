//! Yahoo Finance price and dividend source.
//!
//! Uses the v8 chart API: `interval=1mo` for the monthly series, `interval=1d`
//! over a short window for the reference close, and `events=div` for dividend
//! history. Handles retries with exponential backoff, response parsing and the
//! shared circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{build_series, DataError, DividendSource, PriceSource};
use crate::dividend::DividendEvent;
use crate::domain::{InstrumentId, PriceBar, PriceSeries};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Days searched backwards from the as-of date for a daily close.
const RECENT_CLOSE_WINDOW_DAYS: i64 = 10;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds (28800 for Taipei).
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: BTreeMap<String, DividendData>,
}

#[derive(Debug, Deserialize)]
struct DividendData {
    amount: f64,
    date: i64,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn unix_range(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399;
        (start_ts, end_ts)
    }

    fn monthly_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let (p1, p2) = Self::unix_range(start, end);
        format!("{CHART_BASE}/{symbol}?period1={p1}&period2={p2}&interval=1mo")
    }

    fn daily_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let (p1, p2) = Self::unix_range(start, end);
        format!("{CHART_BASE}/{symbol}?period1={p1}&period2={p2}&interval=1d")
    }

    fn dividends_url(symbol: &str) -> String {
        format!("{CHART_BASE}/{symbol}?range=max&interval=1mo&events=div")
    }

    fn local_date(ts: i64, gmt_offset: i64) -> Result<NaiveDate, DataError> {
        chrono::DateTime::from_timestamp(ts + gmt_offset, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
    }

    fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Parse chart data into monthly bars. Rows with a missing close are skipped.
    ///
    /// Yahoo appends the in-progress month as an extra row stamped with the last
    /// trade time, so rows falling in the same calendar month as the previous bar
    /// are folded into it: the month-start date and open are kept, high and low
    /// widen, the later close wins. Rows dated before the previous bar are dropped.
    fn parse_bars(data: &ChartData) -> Result<Vec<PriceBar>, DataError> {
        let timestamps = data
            .timestamp
            .as_ref()
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;
        let quote = data
            .indicators
            .quote
            .first()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let date = Self::local_date(ts, data.meta.gmt_offset)?;
            let bar = PriceBar {
                date,
                open: quote.open.get(i).copied().flatten().unwrap_or(close),
                high: quote.high.get(i).copied().flatten().unwrap_or(close),
                low: quote.low.get(i).copied().flatten().unwrap_or(close),
                close,
            };
            match bars.last_mut() {
                Some(last) if date < last.date => {
                    tracing::debug!(%date, last = %last.date, "dropping out-of-order row");
                }
                Some(last)
                    if (last.date.year(), last.date.month()) == (date.year(), date.month()) =>
                {
                    last.high = last.high.max(bar.high);
                    last.low = last.low.min(bar.low);
                    last.close = bar.close;
                }
                _ => bars.push(bar),
            }
        }
        Ok(bars)
    }

    fn parse_dividends(data: &ChartData) -> Result<Vec<DividendEvent>, DataError> {
        let Some(events) = &data.events else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(events.dividends.len());
        for div in events.dividends.values() {
            out.push(DividendEvent::new(
                Self::local_date(div.date, data.meta.gmt_offset)?,
                div.amount,
            ));
        }
        out.sort_by_key(|e| e.date);
        Ok(out)
    }

    /// Execute a chart request with retry and circuit breaker logic.
    fn fetch_chart(&self, symbol: &str, url: &str) -> Result<ChartData, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let data = Self::first_result(symbol, chart)?;
                    self.circuit_breaker.record_success();
                    return Ok(data);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_monthly(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let symbol = id.symbol();
        let data = self.fetch_chart(&symbol, &Self::monthly_url(&symbol, start, end))?;
        build_series(&symbol, Self::parse_bars(&data)?)
    }

    fn fetch_recent_close(&self, id: &InstrumentId, as_of: NaiveDate) -> Result<f64, DataError> {
        let symbol = id.symbol();
        let start = as_of - ChronoDuration::days(RECENT_CLOSE_WINDOW_DAYS);
        let data = self.fetch_chart(&symbol, &Self::daily_url(&symbol, start, as_of))?;
        Self::parse_bars(&data)?
            .iter()
            .rev()
            .find(|b| b.date <= as_of && b.close.is_finite())
            .map(|b| b.close)
            .ok_or(DataError::NoRecentClose { symbol })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl DividendSource for YahooProvider {
    fn fetch_dividends(&self, id: &InstrumentId) -> Result<Vec<DividendEvent>, DataError> {
        let symbol = id.symbol();
        let data = self.fetch_chart(&symbol, &Self::dividends_url(&symbol))?;
        Self::parse_dividends(&data)
    }
}
