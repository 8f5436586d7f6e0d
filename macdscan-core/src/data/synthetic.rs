//! Deterministic synthetic prices and dividends for offline runs and tests.
//!
//! Each instrument gets a monthly random walk seeded from the BLAKE3 hash of its
//! ticker. The walk always starts at [`ANCHOR`], so the bar for a given month is
//! the same whatever window is requested. These are clearly fake numbers.

use super::provider::{build_series, DataError, DividendSource, PriceSource};
use crate::dividend::DividendEvent;
use crate::domain::{InstrumentId, PriceBar, PriceSeries};
use chrono::{Datelike, Months, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// First month of every synthetic walk.
pub const ANCHOR: (i32, u32) = (2000, 1);

/// Month in which synthetic dividends are paid.
const PAYOUT_MONTH: u32 = 7;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    /// Last date for which data exists.
    until: NaiveDate,
}

struct Profile {
    start_price: f64,
    drift: f64,
    volatility: f64,
    /// Annual payout as a fraction of price; 0 for non-payers.
    payout: f64,
}

impl SyntheticProvider {
    pub fn new(until: NaiveDate) -> Self {
        Self { until }
    }

    fn rng_for(symbol: &str) -> StdRng {
        let seed = blake3::hash(symbol.as_bytes());
        StdRng::from_seed(*seed.as_bytes())
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(ANCHOR.0, ANCHOR.1, 1).unwrap_or_default()
    }

    fn profile(rng: &mut StdRng) -> Profile {
        let pays = rng.gen_bool(0.7);
        Profile {
            start_price: rng.gen_range(15.0..600.0),
            drift: rng.gen_range(-0.004..0.012),
            volatility: rng.gen_range(0.04..0.12),
            payout: if pays { rng.gen_range(0.01..0.07) } else { 0.0 },
        }
    }

    /// Full walk from the anchor month to the month containing `until`.
    fn walk(symbol: &str, until: NaiveDate) -> (Vec<PriceBar>, f64) {
        let mut rng = Self::rng_for(symbol);
        let profile = Self::profile(&mut rng);

        let mut bars = Vec::new();
        let mut price = profile.start_price;
        let mut month = Self::anchor();

        while month <= until {
            let ret = profile.drift + rng.gen_range(-1.0..1.0) * profile.volatility;
            let open = price;
            let close = (price * (1.0 + ret)).max(1.0);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.05));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.05));

            bars.push(PriceBar {
                date: month,
                open,
                high,
                low,
                close,
            });

            price = close;
            month = month + Months::new(1);
        }

        (bars, profile.payout)
    }
}

impl PriceSource for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_monthly(
        &self,
        id: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let symbol = id.symbol();
        let end = end.min(self.until);
        let (bars, _) = Self::walk(&symbol, end);
        // a month is in range when its first day falls in [start's month, end]
        let first_month = start.with_day(1).unwrap_or(start);
        let bars = bars.into_iter().filter(|b| b.date >= first_month).collect();
        build_series(&symbol, bars)
    }

    fn fetch_recent_close(&self, id: &InstrumentId, as_of: NaiveDate) -> Result<f64, DataError> {
        let symbol = id.symbol();
        let (bars, _) = Self::walk(&symbol, as_of.min(self.until));
        bars.last()
            .map(|b| b.close)
            .ok_or(DataError::NoRecentClose { symbol })
    }
}

impl DividendSource for SyntheticProvider {
    fn fetch_dividends(&self, id: &InstrumentId) -> Result<Vec<DividendEvent>, DataError> {
        let (bars, payout) = Self::walk(&id.symbol(), self.until);
        if payout == 0.0 {
            return Ok(Vec::new());
        }
        Ok(bars
            .iter()
            .filter(|b| b.date.month() == PAYOUT_MONTH)
            .map(|b| {
                let pay_date = b.date.with_day(15).unwrap_or(b.date);
                DividendEvent::new(pay_date, (b.close * payout * 100.0).round() / 100.0)
            })
            .collect())
    }
}
