//! Data sources: universe listings, monthly prices and dividend history.

pub mod circuit_breaker;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{build_series, DataError, DividendSource, PriceSource, UniverseSource};
pub use synthetic::SyntheticProvider;
pub use universe::{resolve_universe, ResolvedUniverse, StaticUniverse, TwseListing};
pub use yahoo::YahooProvider;
