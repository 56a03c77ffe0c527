//! Averaging denominator analysis
//!
//! Decides how to normalize a category's monthly average when the window
//! has gaps. The denominator is always the number of months that actually
//! had activity, never the full requested window: dividing a quarterly
//! bill or a short scraping history by six months would understate every
//! average it feeds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::AveragingConfig;
use crate::models::YearMonth;

/// Coverage classification for a category inside an analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageClass {
    /// Activity in every window month
    Regular,
    /// Activity in most window months
    MostlyRegular,
    /// Activity in at least half the window months
    SemiRegular,
    /// Sparse activity
    Irregular,
}

impl CoverageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::MostlyRegular => "mostly_regular",
            Self::SemiRegular => "semi_regular",
            Self::Irregular => "irregular",
        }
    }
}

impl std::str::FromStr for CoverageClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Self::Regular),
            "mostly_regular" => Ok(Self::MostlyRegular),
            "semi_regular" => Ok(Self::SemiRegular),
            "irregular" => Ok(Self::Irregular),
            _ => Err(format!("Unknown coverage class: {}", s)),
        }
    }
}

impl std::fmt::Display for CoverageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the denominator analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenominatorAnalysis {
    pub coverage_percent: f64,
    pub classification: CoverageClass,
    pub confidence: f64,
    /// Months to divide by when averaging
    pub denominator: u32,
    /// Human-readable audit trail for UI display
    pub reasoning: String,
}

/// Analyze with default thresholds
pub fn analyze_denominator(
    present_months: &BTreeSet<YearMonth>,
    window_months: u32,
    history_months: Option<u32>,
) -> DenominatorAnalysis {
    analyze_denominator_with(
        &AveragingConfig::default(),
        present_months,
        window_months,
        history_months,
    )
}

/// Classify a category's window coverage and pick the averaging denominator
///
/// Pure: identical inputs always yield identical output. `history_months`
/// shrinks the effective window when the account's own transaction history
/// begins inside it, so a freshly connected account is not misread as
/// irregular.
pub fn analyze_denominator_with(
    config: &AveragingConfig,
    present_months: &BTreeSet<YearMonth>,
    window_months: u32,
    history_months: Option<u32>,
) -> DenominatorAnalysis {
    let effective_window = history_months
        .map_or(window_months, |h| h.min(window_months))
        .max(1);
    let present = present_months.len() as u32;

    if present == 0 {
        return DenominatorAnalysis {
            coverage_percent: 0.0,
            classification: CoverageClass::Irregular,
            confidence: config.confidence.irregular,
            denominator: 1,
            reasoning: format!(
                "No months with activity in the {}-month window; denominator forced to 1 so the average is 0",
                effective_window
            ),
        };
    }

    let coverage_percent = present as f64 / effective_window as f64 * 100.0;

    let (classification, confidence) = if coverage_percent >= 100.0 {
        (CoverageClass::Regular, config.confidence.regular)
    } else if coverage_percent >= config.mostly_regular_floor {
        (CoverageClass::MostlyRegular, config.confidence.mostly_regular)
    } else if coverage_percent >= config.semi_regular_floor {
        (CoverageClass::SemiRegular, config.confidence.semi_regular)
    } else {
        (CoverageClass::Irregular, config.confidence.irregular)
    };

    let mut reasoning = format!(
        "Activity in {} of {} window months ({:.0}% coverage), classified {}; averaging over the {} active months",
        present, effective_window, coverage_percent, classification, present
    );
    if let Some(history) = history_months {
        if history < window_months {
            reasoning.push_str(&format!(
                " (account history covers only {} of the requested {} months)",
                history, window_months
            ));
        }
    }

    DenominatorAnalysis {
        coverage_percent,
        classification,
        confidence,
        denominator: present,
        reasoning,
    }
}
