//! Dashboard counts over a result list.

use serde::Serialize;

use macdscan_core::domain::Market;

use crate::result::ScanResult;

/// Strength tier of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthTier {
    Strong,
    Medium,
    Weak,
}

impl StrengthTier {
    /// Strong at 2 or more confirmations, medium at exactly 1, weak at 0.
    pub fn of(strength: u8) -> Self {
        match strength {
            0 => StrengthTier::Weak,
            1 => StrengthTier::Medium,
            _ => StrengthTier::Strong,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrengthTier::Strong => "strong",
            StrengthTier::Medium => "medium",
            StrengthTier::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub found: usize,
    pub strong: usize,
    pub medium: usize,
    pub weak: usize,
    /// Results whose MACD line is above zero.
    pub bullish: usize,
    pub primary: usize,
    pub secondary: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut s = Self {
            found: results.len(),
            ..Self::default()
        };
        for r in results {
            match StrengthTier::of(r.strength()) {
                StrengthTier::Strong => s.strong += 1,
                StrengthTier::Medium => s.medium += 1,
                StrengthTier::Weak => s.weak += 1,
            }
            if r.is_bullish() {
                s.bullish += 1;
            }
            match r.market() {
                Market::Primary => s.primary += 1,
                Market::Secondary => s.secondary += 1,
            }
        }
        s
    }
}
