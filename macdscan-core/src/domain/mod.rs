//! Domain types for macdscan

pub mod bar;
pub mod instrument;

pub use bar::{PriceBar, PriceSeries, SeriesError, MIN_HISTORY_BARS};
pub use instrument::{InstrumentError, InstrumentId, Market};
