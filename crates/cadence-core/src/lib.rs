//! Cadence Core Library
//!
//! Shared functionality for the cadence budgeting tool:
//! - Database access and migrations
//! - Ledger CSV import
//! - Recurring-expense pattern detection (grouping + periodicity classification)
//! - Pattern store with an approval state machine
//! - Averaging denominator analysis for incomplete histories
//! - Monthly budget auto-calculation from history
//! - Threshold configuration loading

pub mod averaging;
pub mod budget;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod import;
pub mod models;

pub use averaging::{
    analyze_denominator, analyze_denominator_with, CoverageClass, DenominatorAnalysis,
};
pub use budget::{BudgetCalculationResult, BudgetCalculator, BudgetLine};
pub use config::{AveragingConfig, Config, ConfidenceFloors, DetectionConfig};
pub use db::{Database, PatternTransition};
pub use detect::PatternDetector;
pub use error::{Error, Result};
pub use models::{
    ApprovalAction, ApprovalStatus, CandidatePattern, DetectionData, FlowDirection, GroupKey,
    NewTransaction, Occurrence, Periodicity, StoredPattern, Transaction, TransitionResult,
    YearMonth,
};
