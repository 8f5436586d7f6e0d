//! Universe sources: the exchange listing pages, a built-in preset, and TOML files.
//!
//! A TOML universe file lists instruments either as tickers or as tables:
//!
//! ```toml
//! tickers = ["2330.TW", "6488.TWO"]
//!
//! [[instruments]]
//! code = "2317"
//! market = "primary"
//! name = "鴻海"
//! ```

use super::provider::{DataError, UniverseSource};
use crate::domain::{InstrumentId, Market};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const LISTING_BASE: &str = "https://isin.twse.com.tw/isin/C_public.jsp";

/// Preset tickers used for quick scans and as the fallback universe.
const PRESET_TICKERS: &[&str] = &[
    // large caps
    "2330.TW", "2454.TW", "2317.TW", "6505.TW", "2308.TW", "2882.TW", "2881.TW", "2303.TW",
    "2412.TW", "2886.TW", "2382.TW", "2891.TW", "3711.TW", "2002.TW", "1301.TW", "1303.TW",
    "2912.TW", "2884.TW", "1326.TW", "2357.TW",
    // electronics
    "2409.TW", "3034.TW", "2327.TW", "3037.TW", "2379.TW", "3045.TW", "2395.TW", "2377.TW",
    "2353.TW", "4938.TW", "6669.TW", "3443.TW", "6415.TW", "5274.TW", "6789.TW",
    // shipping
    "2603.TW", "2609.TW", "2615.TW", "2618.TW", "5608.TW",
    // finance
    "2880.TW", "2885.TW", "2887.TW", "2890.TW", "2892.TW", "5880.TW", "2801.TW", "2834.TW",
    "2836.TW", "2809.TW",
    // traditional industry
    "1216.TW", "1402.TW", "2207.TW", "2301.TW", "2474.TW", "4904.TW", "9904.TW", "1101.TW",
    "2105.TW", "2049.TW",
];

/// Fixed instrument list, from the preset or a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUniverse {
    name: String,
    instruments: Vec<InstrumentId>,
}

#[derive(Debug, Default, Deserialize)]
struct UniverseFile {
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    instruments: Vec<InstrumentId>,
}

#[derive(Serialize)]
struct UniverseFileOut<'a> {
    instruments: &'a [InstrumentId],
}

impl StaticUniverse {
    pub fn new(name: impl Into<String>, instruments: Vec<InstrumentId>) -> Self {
        Self {
            name: name.into(),
            instruments,
        }
    }

    /// Built-in preset: a few dozen large listed names, sorted by code, names empty.
    pub fn preset() -> Self {
        let mut instruments: Vec<InstrumentId> = PRESET_TICKERS
            .iter()
            .filter_map(|t| InstrumentId::parse(t).ok())
            .collect();
        instruments.sort_by(|a, b| a.code.cmp(&b.code));
        instruments.dedup();
        Self::new("preset", instruments)
    }

    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::UniverseUnavailable(format!("read universe file {}: {e}", path.display()))
        })?;
        let mut universe = Self::from_toml(&content)?;
        universe.name = path.display().to_string();
        Ok(universe)
    }

    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        let file: UniverseFile = toml::from_str(content)
            .map_err(|e| DataError::UniverseUnavailable(format!("parse universe TOML: {e}")))?;

        let mut instruments = Vec::with_capacity(file.tickers.len() + file.instruments.len());
        for ticker in &file.tickers {
            let id = InstrumentId::parse(ticker)
                .map_err(|e| DataError::UniverseUnavailable(e.to_string()))?;
            instruments.push(id);
        }
        instruments.extend(file.instruments);
        Ok(Self::new("file", instruments))
    }

    pub fn to_toml(&self) -> Result<String, DataError> {
        toml::to_string_pretty(&UniverseFileOut {
            instruments: &self.instruments,
        })
        .map_err(|e| DataError::Other(format!("serialize universe: {e}")))
    }

    pub fn instruments(&self) -> &[InstrumentId] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl UniverseSource for StaticUniverse {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<InstrumentId>, DataError> {
        Ok(self.instruments.clone())
    }
}

/// Listing page of one board on the exchange's ISIN site.
///
/// Pages are Big5-encoded HTML tables; the first cell of each equity row reads
/// `NNNN　Name` with an ideographic space (U+3000) separator. Only four-digit
/// codes are kept, which drops warrants, ETFs with longer codes and section
/// headers.
pub struct TwseListing {
    market: Market,
    url: String,
    client: reqwest::blocking::Client,
}

impl TwseListing {
    pub fn new(market: Market) -> Result<Self, DataError> {
        let mode = match market {
            Market::Primary => 2,
            Market::Secondary => 4,
        };
        Self::with_url(market, format!("{LISTING_BASE}?strMode={mode}"))
    }

    pub fn with_url(market: Market, url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            market,
            url: url.into(),
            client,
        })
    }

    /// Below this count the page is probably truncated or restructured.
    fn expected_minimum(&self) -> usize {
        match self.market {
            Market::Primary => 100,
            Market::Secondary => 50,
        }
    }

    /// Extract instruments from a decoded listing page.
    pub fn parse_listing(html: &str, market: Market) -> Result<Vec<InstrumentId>, DataError> {
        let cell = Regex::new(r"<td[^>]*>\s*(\d{4})\x{3000}([^<]*)</td>")
            .map_err(|e| DataError::Other(format!("listing pattern: {e}")))?;

        let mut seen = HashSet::new();
        let instruments = cell
            .captures_iter(html)
            .filter(|caps| seen.insert(caps[1].to_string()))
            .map(|caps| InstrumentId::new(&caps[1], market, caps[2].trim()))
            .collect();
        Ok(instruments)
    }
}

impl UniverseSource for TwseListing {
    fn name(&self) -> &str {
        match self.market {
            Market::Primary => "twse_listed",
            Market::Secondary => "twse_otc",
        }
    }

    fn fetch(&self) -> Result<Vec<InstrumentId>, DataError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {}", self.url)));
        }

        let html = resp
            .text_with_charset("big5")
            .map_err(|e| DataError::ResponseFormatChanged(format!("decode listing page: {e}")))?;

        let instruments = Self::parse_listing(&html, self.market)?;
        if instruments.is_empty() {
            return Err(DataError::ResponseFormatChanged(
                "listing page contained no instruments".into(),
            ));
        }
        if instruments.len() < self.expected_minimum() {
            tracing::warn!(
                source = self.name(),
                count = instruments.len(),
                "listing returned fewer instruments than expected"
            );
        }
        Ok(instruments)
    }
}

/// Outcome of [`resolve_universe`].
#[derive(Debug, Clone)]
pub struct ResolvedUniverse {
    pub instruments: Vec<InstrumentId>,
    /// Sources that contributed at least one instrument.
    pub sources: Vec<String>,
    pub used_fallback: bool,
}

/// Merge sources in order, dropping duplicate tickers (first occurrence wins).
///
/// When every source fails or is empty, the fallback list is used. An empty
/// final list is an error.
pub fn resolve_universe(
    sources: &[&dyn UniverseSource],
    fallback: Option<&StaticUniverse>,
) -> Result<ResolvedUniverse, DataError> {
    let mut seen = HashSet::new();
    let mut instruments = Vec::new();
    let mut used = Vec::new();

    for source in sources {
        match source.fetch() {
            Ok(list) => {
                let before = instruments.len();
                for id in list {
                    if seen.insert(id.symbol()) {
                        instruments.push(id);
                    }
                }
                let added = instruments.len() - before;
                tracing::info!(source = source.name(), added, "universe source resolved");
                if added > 0 {
                    used.push(source.name().to_string());
                }
            }
            Err(e) => tracing::warn!(source = source.name(), error = %e, "universe source failed"),
        }
    }

    let mut used_fallback = false;
    if instruments.is_empty() {
        if let Some(fallback) = fallback {
            tracing::warn!(
                count = fallback.len(),
                "no universe source succeeded, falling back to preset list"
            );
            instruments = fallback.instruments().to_vec();
            used.push(fallback.name().to_string());
            used_fallback = true;
        }
    }

    if instruments.is_empty() {
        return Err(DataError::UniverseUnavailable(
            "no instruments from any source".into(),
        ));
    }

    Ok(ResolvedUniverse {
        instruments,
        sources: used,
        used_fallback,
    })
}
