//! One included scan match.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use macdscan_core::dividend::DividendSummary;
use macdscan_core::domain::{InstrumentId, Market};
use macdscan_core::signal::{MacdLevel, SignalRecord};

/// An instrument that matched the detection mode and passed every filter.
///
/// Results are appended to the scan accumulator as soon as they are produced
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Position of the instrument in the resolved universe.
    pub universe_index: usize,
    pub instrument: InstrumentId,
    pub latest_close: f64,
    pub latest_low: f64,
    /// Period-end date of the bar the signal was evaluated on.
    pub latest_date: NaiveDate,
    pub signal: SignalRecord,
    pub dividend: DividendSummary,
}

impl ScanResult {
    pub fn strength(&self) -> u8 {
        self.signal.strength()
    }

    pub fn market(&self) -> Market {
        self.instrument.market
    }

    pub fn is_bullish(&self) -> bool {
        self.signal.level == MacdLevel::Bullish
    }
}
