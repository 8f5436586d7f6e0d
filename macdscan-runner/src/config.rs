//! Serializable scan configuration.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use macdscan_core::indicators::IndicatorParams;
use macdscan_core::signal::DetectionMode;
use macdscan_core::MIN_HISTORY_BARS;

use crate::filter::ScanFilters;

/// Content-addressable identifier of a scan configuration.
pub type ScanId = String;

/// Names accepted by [`ScanConfig::preset`].
pub const PRESET_NAMES: &[&str] = &["first_red", "bullish_first_red", "green_shrink"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Everything needed to reproduce a scan over a given universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: DetectionMode,
    /// Months of history requested per instrument.
    pub lookback_months: u32,
    /// Worker threads; 1 scans sequentially on the calling thread.
    pub workers: usize,
    /// Evaluation date; `None` means today.
    pub as_of: Option<NaiveDate>,
    pub filters: ScanFilters,
    pub indicators: IndicatorParams,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::FirstBullishCrossover,
            lookback_months: 24,
            workers: 4,
            as_of: None,
            filters: ScanFilters::default(),
            indicators: IndicatorParams::default(),
        }
    }
}

impl ScanConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Named configurations matching the common scan setups.
    ///
    /// - `first_red`: first bullish crossover, any MACD level
    /// - `bullish_first_red`: first bullish crossover with MACD above zero
    /// - `green_shrink`: bearish shrink of at least 10 %
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        match name {
            "first_red" => {}
            "bullish_first_red" => config.filters.require_bullish_level = true,
            "green_shrink" => {
                config.mode = DetectionMode::BearishShrink;
                config.filters.min_shrink_pct = 10.0;
            }
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be >= 1".into()));
        }
        if (self.lookback_months as usize) < MIN_HISTORY_BARS {
            return Err(ConfigError::Invalid(format!(
                "lookback_months ({}) must be at least {MIN_HISTORY_BARS}",
                self.lookback_months
            )));
        }
        self.indicators.validate().map_err(ConfigError::Invalid)?;
        self.filters.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Evaluation date, defaulting to today's local date.
    pub fn resolved_as_of(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Copy with `as_of` pinned, so the scan id identifies the evaluated date.
    pub fn pinned(&self) -> Self {
        Self {
            as_of: Some(self.resolved_as_of()),
            ..self.clone()
        }
    }

    /// Inclusive history window `[as_of - lookback_months, as_of]`.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        let end = self.resolved_as_of();
        let start = end
            .checked_sub_months(Months::new(self.lookback_months))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    /// Deterministic hash of this configuration.
    ///
    /// Two scans with identical configs share the same id.
    pub fn scan_id(&self) -> ScanId {
        // serde_json cannot fail on this struct: string keys only, no maps
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
