//! Detection and averaging threshold configuration
//!
//! Every numeric floor in the detector and analyzer is an empirical
//! constant, so all of them live here as named, overridable settings
//! rather than inline literals.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Embedded defaults (config/detection.toml compiled into the binary)
//! 2. Optional override file applied on top (`cadence --config <path>`)

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::Periodicity;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/detection.toml");

/// Thresholds for pattern detection
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum distinct monthly occurrences before a group is considered
    pub min_occurrences: usize,
    /// Default lookback window in months
    pub lookback_months: u32,
    /// Hard bound on any lookback window, detection and budgeting alike.
    /// Must be at least 25, or yearly patterns can never accumulate the
    /// minimum three occurrences.
    pub max_lookback_months: u32,
    /// Coefficient of variation above which confidence is penalized
    pub amount_cv_threshold: f64,
    /// Width of the grouping amount bucket
    pub amount_bucket_size: f64,
    /// Per-periodicity confidence floors
    pub confidence_floors: ConfidenceFloors,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            lookback_months: 6,
            max_lookback_months: 36,
            amount_cv_threshold: 0.1,
            amount_bucket_size: 10.0,
            confidence_floors: ConfidenceFloors::default(),
        }
    }
}

/// Minimum confidence a candidate needs per periodicity
#[derive(Debug, Clone, Deserialize)]
pub struct ConfidenceFloors {
    pub bimonthly: f64,
    pub quarterly: f64,
    pub yearly: f64,
}

impl Default for ConfidenceFloors {
    fn default() -> Self {
        Self {
            bimonthly: 0.8,
            quarterly: 0.8,
            yearly: 0.7,
        }
    }
}

impl ConfidenceFloors {
    pub fn floor_for(&self, periodicity: Periodicity) -> f64 {
        match periodicity {
            Periodicity::BiMonthly => self.bimonthly,
            Periodicity::Quarterly => self.quarterly,
            Periodicity::Yearly => self.yearly,
        }
    }
}

/// Thresholds for the averaging denominator analyzer
#[derive(Debug, Clone)]
pub struct AveragingConfig {
    /// Coverage percent at or above which a category is "mostly regular"
    pub mostly_regular_floor: f64,
    /// Coverage percent at or above which a category is "semi regular"
    pub semi_regular_floor: f64,
    /// Confidence attached to each classification
    pub confidence: CoverageConfidence,
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self {
            mostly_regular_floor: 80.0,
            semi_regular_floor: 50.0,
            confidence: CoverageConfidence::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverageConfidence {
    pub regular: f64,
    pub mostly_regular: f64,
    pub semi_regular: f64,
    pub irregular: f64,
}

impl Default for CoverageConfidence {
    fn default() -> Self {
        Self {
            regular: 0.95,
            mostly_regular: 0.80,
            semi_regular: 0.60,
            irregular: 0.40,
        }
    }
}

/// Full threshold configuration for the core
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub averaging: AveragingConfig,
}

impl Config {
    /// Load embedded defaults, then apply an optional override file
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();
        config.apply_toml(DEFAULT_CONFIG)?;

        if let Some(path) = override_path {
            let text = fs::read_to_string(path)?;
            config.apply_toml(&text)?;
        }

        Ok(config)
    }

    /// Apply a TOML document on top of the current values.
    ///
    /// Missing keys keep their current values, so override files only
    /// need to name what they change.
    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;

        if let Some(detection) = file.detection {
            if let Some(v) = detection.min_occurrences {
                self.detection.min_occurrences = v;
            }
            if let Some(v) = detection.lookback_months {
                self.detection.lookback_months = v;
            }
            if let Some(v) = detection.max_lookback_months {
                self.detection.max_lookback_months = v;
            }
            if let Some(v) = detection.amount_cv_threshold {
                self.detection.amount_cv_threshold = v;
            }
            if let Some(v) = detection.amount_bucket_size {
                self.detection.amount_bucket_size = v;
            }
            if let Some(v) = detection.confidence_floors {
                self.detection.confidence_floors = v;
            }
        }

        if let Some(averaging) = file.averaging {
            if let Some(v) = averaging.mostly_regular_floor {
                self.averaging.mostly_regular_floor = v;
            }
            if let Some(v) = averaging.semi_regular_floor {
                self.averaging.semi_regular_floor = v;
            }
            if let Some(v) = averaging.confidence {
                self.averaging.confidence = v;
            }
        }

        Ok(())
    }
}

/// Raw file layer; every key optional so overrides can be partial
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    detection: Option<DetectionSection>,
    averaging: Option<AveragingSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSection {
    min_occurrences: Option<usize>,
    lookback_months: Option<u32>,
    max_lookback_months: Option<u32>,
    amount_cv_threshold: Option<f64>,
    amount_bucket_size: Option<f64>,
    confidence_floors: Option<ConfidenceFloors>,
}

#[derive(Debug, Default, Deserialize)]
struct AveragingSection {
    mostly_regular_floor: Option<f64>,
    semi_regular_floor: Option<f64>,
    confidence: Option<CoverageConfidence>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.detection.min_occurrences, 3);
        assert_eq!(config.detection.lookback_months, 6);
        assert_eq!(config.detection.max_lookback_months, 36);
        assert!((config.detection.confidence_floors.bimonthly - 0.8).abs() < f64::EPSILON);
        assert!((config.detection.confidence_floors.yearly - 0.7).abs() < f64::EPSILON);
        assert!((config.averaging.mostly_regular_floor - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        // The shipped TOML and the Default impls must agree, otherwise
        // callers constructing configs directly get different behavior
        // than the CLI.
        let loaded = Config::load(None).unwrap();
        let built = Config::default();
        assert_eq!(loaded.detection.min_occurrences, built.detection.min_occurrences);
        assert_eq!(loaded.detection.lookback_months, built.detection.lookback_months);
        assert!(
            (loaded.detection.amount_cv_threshold - built.detection.amount_cv_threshold).abs()
                < f64::EPSILON
        );
        assert!(
            (loaded.averaging.semi_regular_floor - built.averaging.semi_regular_floor).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_partial_override() {
        let mut config = Config::default();
        config
            .apply_toml("[detection]\nlookback_months = 12\n")
            .unwrap();
        assert_eq!(config.detection.lookback_months, 12);
        // Untouched keys keep defaults
        assert_eq!(config.detection.min_occurrences, 3);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let mut config = Config::default();
        let err = config.apply_toml("[detection\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_floor_for_periodicity() {
        let floors = ConfidenceFloors::default();
        assert!((floors.floor_for(Periodicity::BiMonthly) - 0.8).abs() < f64::EPSILON);
        assert!((floors.floor_for(Periodicity::Quarterly) - 0.8).abs() < f64::EPSILON);
        assert!((floors.floor_for(Periodicity::Yearly) - 0.7).abs() < f64::EPSILON);
    }
}
