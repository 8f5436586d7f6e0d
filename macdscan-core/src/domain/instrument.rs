use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Market an instrument is listed on.
///
/// Primary is the main exchange board (`.TW` tickers), Secondary the
/// over-the-counter board (`.TWO` tickers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Primary,
    Secondary,
}

impl Market {
    /// Provider ticker suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            Market::Primary => ".TW",
            Market::Secondary => ".TWO",
        }
    }

    /// Local display label (上市 / 上櫃).
    pub fn label(&self) -> &'static str {
        match self {
            Market::Primary => "上市",
            Market::Secondary => "上櫃",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Primary => f.write_str("primary"),
            Market::Secondary => f.write_str("secondary"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("ticker '{0}' has no market suffix (.TW or .TWO)")]
    MissingSuffix(String),

    #[error("ticker '{0}' has an empty code")]
    EmptyCode(String),
}

/// Instrument identity as obtained from a universe source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentId {
    pub code: String,
    pub market: Market,
    /// Display name; empty when the universe source has none.
    #[serde(default)]
    pub name: String,
}

impl InstrumentId {
    pub fn new(code: impl Into<String>, market: Market, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            market,
            name: name.into(),
        }
    }

    /// Parse a provider ticker such as `2330.TW` or `6488.TWO`.
    pub fn parse(ticker: &str) -> Result<Self, InstrumentError> {
        let ticker = ticker.trim();
        let (code, market) = if let Some(code) = ticker.strip_suffix(".TWO") {
            (code, Market::Secondary)
        } else if let Some(code) = ticker.strip_suffix(".TW") {
            (code, Market::Primary)
        } else {
            return Err(InstrumentError::MissingSuffix(ticker.to_string()));
        };
        if code.is_empty() {
            return Err(InstrumentError::EmptyCode(ticker.to_string()));
        }
        Ok(Self::new(code, market, ""))
    }

    /// Provider ticker (`code` + market suffix).
    pub fn symbol(&self) -> String {
        format!("{}{}", self.code, self.market.suffix())
    }

    /// Name for display, falling back to the code.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.symbol())
        } else {
            write!(f, "{} {}", self.symbol(), self.name)
        }
    }
}
