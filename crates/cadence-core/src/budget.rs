//! Monthly budget auto-calculation
//!
//! Combines a category's regular spending average with its approved
//! recurring patterns. The pattern contribution is added on top of the
//! regular average for months the pattern is scheduled in, never
//! substituted for it, so a bi-monthly bill does not erase the baseline
//! spending of its category.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::averaging::{analyze_denominator_with, DenominatorAnalysis};
use crate::config::{AveragingConfig, DetectionConfig};
use crate::db::Database;
use crate::detect::group_key_for;
use crate::error::{Error, Result};
use crate::models::YearMonth;

/// One category's computed budget line
#[derive(Debug, Clone, Serialize)]
pub struct BudgetLine {
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    /// Final amount: regular average plus any scheduled pattern
    pub budgeted_amount: f64,
    /// Baseline monthly spending, excluding patterned transactions
    pub regular_average: f64,
    /// Sum of approved pattern amounts scheduled in the target month
    pub pattern_contribution: f64,
    pub averaging: DenominatorAnalysis,
}

/// Result of calculating a month's budget from history
#[derive(Debug, Clone, Serialize)]
pub struct BudgetCalculationResult {
    pub year: i32,
    pub month: u32,
    pub lines: Vec<BudgetLine>,
    /// Stored patterns for the user, regardless of state
    pub total_patterns_detected: i64,
    /// Approved patterns scheduled in the target month
    pub patterns_for_this_month: i64,
    /// True while any pattern still awaits a decision
    pub requires_approval: bool,
}

#[derive(Debug, Default)]
struct CategoryAccum {
    regular_total: f64,
    present_months: BTreeSet<YearMonth>,
}

/// Calculates a month's budget from a user's transaction history
pub struct BudgetCalculator<'a> {
    db: &'a Database,
    detection: DetectionConfig,
    averaging: AveragingConfig,
}

impl<'a> BudgetCalculator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            detection: DetectionConfig::default(),
            averaging: AveragingConfig::default(),
        }
    }

    pub fn with_config(
        db: &'a Database,
        detection: DetectionConfig,
        averaging: AveragingConfig,
    ) -> Self {
        Self {
            db,
            detection,
            averaging,
        }
    }

    /// Calculate the budget for (year, month) from the `months_to_analyze`
    /// months immediately before it.
    ///
    /// Transactions matching an approved pattern's group key are excluded
    /// from the regular average; the pattern instead contributes its own
    /// average amount in the months it is scheduled. Categories without
    /// any separately configured budget structure still compute; absence
    /// of configuration is never an error.
    pub fn calculate_from_history(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        months_to_analyze: u32,
    ) -> Result<BudgetCalculationResult> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!("Invalid month: {}", month)));
        }

        let window = months_to_analyze.clamp(1, self.detection.max_lookback_months);
        if window != months_to_analyze {
            warn!(
                requested = months_to_analyze,
                window, "Clamped budget analysis window"
            );
        }

        let target = YearMonth::new(year, month);
        let window_start = target.minus_months(window);
        let transactions =
            self.db
                .transactions_in_range(user_id, window_start.first_day(), target.first_day())?;

        let active_patterns = self.db.get_active_patterns(user_id)?;
        let pattern_keys: HashSet<&str> = active_patterns
            .iter()
            .map(|p| p.group_key.as_str())
            .collect();

        // Partition each category's window transactions into patterned
        // (claimed by an approved pattern) and regular
        let mut by_category: BTreeMap<(Option<i64>, Option<i64>), CategoryAccum> = BTreeMap::new();
        for tx in &transactions {
            let accum = by_category
                .entry((tx.category_id, tx.sub_category_id))
                .or_default();

            let key = group_key_for(tx, self.detection.amount_bucket_size).storage_key();
            if pattern_keys.contains(key.as_str()) {
                // Covered by the pattern's own contribution below
                continue;
            }

            accum.regular_total += tx.amount;
            accum.present_months.insert(YearMonth::from_date(tx.date));
        }

        // Pattern contributions for the target month, per category pair.
        // A pattern whose charges fall outside the window (e.g. yearly)
        // still budgets its category in scheduled months.
        let mut contributions: BTreeMap<(Option<i64>, Option<i64>), f64> = BTreeMap::new();
        for pattern in &active_patterns {
            if pattern.is_scheduled_in(month) {
                *contributions
                    .entry((pattern.category_id, pattern.sub_category_id))
                    .or_insert(0.0) += pattern.average_amount;
                by_category
                    .entry((pattern.category_id, pattern.sub_category_id))
                    .or_default();
            }
        }

        let mut lines = Vec::with_capacity(by_category.len());
        for ((category_id, sub_category_id), accum) in by_category {
            let averaging = analyze_denominator_with(
                &self.averaging,
                &accum.present_months,
                window,
                None,
            );

            let regular_average = if accum.present_months.is_empty() {
                0.0
            } else {
                (accum.regular_total / averaging.denominator as f64).abs()
            };

            let pattern_contribution = contributions
                .get(&(category_id, sub_category_id))
                .copied()
                .unwrap_or(0.0);

            lines.push(BudgetLine {
                category_id,
                sub_category_id,
                budgeted_amount: regular_average + pattern_contribution,
                regular_average,
                pattern_contribution,
                averaging,
            });
        }

        let total_patterns_detected = self.db.count_patterns(user_id)?;
        let patterns_for_this_month = active_patterns
            .iter()
            .filter(|p| p.is_scheduled_in(month))
            .count() as i64;
        let requires_approval = self.db.has_pending_patterns(user_id)?;

        info!(
            user_id,
            year,
            month,
            lines = lines.len(),
            patterns_for_this_month,
            "Budget calculation complete"
        );

        Ok(BudgetCalculationResult {
            year,
            month,
            lines,
            total_patterns_detected,
            patterns_for_this_month,
            requires_approval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PatternDetector;
    use crate::models::NewTransaction;
    use chrono::NaiveDate;

    fn insert_tx(
        db: &Database,
        user_id: i64,
        date: &str,
        description: &str,
        amount: f64,
        category_id: Option<i64>,
    ) {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let tx = NewTransaction {
            date,
            processed_date: None,
            description: description.to_string(),
            amount,
            category_id,
            sub_category_id: None,
            import_hash: format!("{}_{}_{}", description, date, amount),
        };
        db.insert_transaction(user_id, &tx).unwrap();
    }

    /// Detect over Jan-Jun 2026, store, approve everything
    fn detect_and_approve_all(db: &Database, user_id: i64) {
        let detector = PatternDetector::new(db);
        let candidates = detector
            .detect_patterns_in_window(user_id, YearMonth::new(2026, 6), Some(6))
            .unwrap();
        let stored = db.store_detected_patterns(user_id, &candidates).unwrap();
        for pattern in stored {
            db.approve_pattern(pattern.id).unwrap();
        }
    }

    #[test]
    fn test_regular_average_uses_present_months() {
        // Groceries in 5 of 6 window months, 100 each: average is 100, not 83
        let db = Database::in_memory().unwrap();
        for month in [1, 2, 3, 5, 6] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-12", month),
                &format!("Groceries {}", month),
                -100.0,
                Some(2),
            );
        }

        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        assert_eq!(result.lines.len(), 1);
        let line = &result.lines[0];
        assert!((line.regular_average - 100.0).abs() < 1e-9);
        assert!((line.budgeted_amount - 100.0).abs() < 1e-9);
        assert_eq!(line.averaging.denominator, 5);
    }

    #[test]
    fn test_single_sporadic_month_not_smeared() {
        // One 80.00 charge in 6 months: average is 80, not 13.33
        let db = Database::in_memory().unwrap();
        insert_tx(&db, 1, "2026-03-20", "Shoe Store", -80.0, Some(5));

        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        let line = &result.lines[0];
        assert!((line.regular_average - 80.0).abs() < 1e-9);
        assert_eq!(line.averaging.denominator, 1);
    }

    #[test]
    fn test_approved_pattern_adds_in_scheduled_month() {
        let db = Database::in_memory().unwrap();
        // Bi-monthly municipal tax, months 1/3/5
        for month in [1, 3, 5] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-10", month),
                "Municipal Tax",
                -450.0,
                Some(4),
            );
        }
        // Regular spending in the same category, every month
        for month in 1..=6 {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-20", month),
                &format!("City Fees {}", month),
                -50.0,
                Some(4),
            );
        }
        detect_and_approve_all(&db, 1);

        // July is a scheduled month (1,3,5,7,9,11)
        let july = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();
        let line = &july.lines[0];
        assert!((line.regular_average - 50.0).abs() < 1e-9);
        assert!((line.pattern_contribution - 450.0).abs() < 1e-9);
        assert!((line.budgeted_amount - 500.0).abs() < 1e-9);
        assert_eq!(july.patterns_for_this_month, 1);

        // August is not scheduled: regular average only
        let august = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 8, 6)
            .unwrap();
        let line = &august.lines[0];
        assert!((line.pattern_contribution - 0.0).abs() < 1e-9);
        assert!((line.budgeted_amount - line.regular_average).abs() < 1e-9);
        assert_eq!(august.patterns_for_this_month, 0);
    }

    #[test]
    fn test_pending_pattern_does_not_contribute() {
        let db = Database::in_memory().unwrap();
        for month in [1, 3, 5] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-10", month),
                "Municipal Tax",
                -450.0,
                Some(4),
            );
        }
        // Detect and store, but do not approve
        let detector = PatternDetector::new(&db);
        let candidates = detector
            .detect_patterns_in_window(1, YearMonth::new(2026, 6), Some(6))
            .unwrap();
        db.store_detected_patterns(1, &candidates).unwrap();

        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        // Unapproved pattern: its transactions stay in the regular pool
        let line = &result.lines[0];
        assert!((line.pattern_contribution - 0.0).abs() < 1e-9);
        assert!(line.regular_average > 0.0);
        assert!(result.requires_approval);
        assert_eq!(result.patterns_for_this_month, 0);
        assert_eq!(result.total_patterns_detected, 1);
    }

    #[test]
    fn test_rejected_pattern_transactions_stay_regular() {
        let db = Database::in_memory().unwrap();
        for month in [1, 3, 5] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-10", month),
                "Municipal Tax",
                -450.0,
                Some(4),
            );
        }
        let detector = PatternDetector::new(&db);
        let candidates = detector
            .detect_patterns_in_window(1, YearMonth::new(2026, 6), Some(6))
            .unwrap();
        let stored = db.store_detected_patterns(1, &candidates).unwrap();
        db.reject_pattern(stored[0].id).unwrap();

        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        let line = &result.lines[0];
        assert!((line.pattern_contribution - 0.0).abs() < 1e-9);
        // 3 active months of -450 averaged over 3 present months
        assert!((line.regular_average - 450.0).abs() < 1e-9);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_pattern_only_category_still_gets_a_line() {
        // The pattern's charges fall inside the window and are all
        // claimed by it; the category line is pattern contribution only
        let db = Database::in_memory().unwrap();
        for month in [1, 3, 5] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-10", month),
                "Municipal Tax",
                -450.0,
                Some(4),
            );
        }
        detect_and_approve_all(&db, 1);

        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        assert_eq!(result.lines.len(), 1);
        let line = &result.lines[0];
        assert!((line.regular_average - 0.0).abs() < 1e-9);
        assert!((line.pattern_contribution - 450.0).abs() < 1e-9);
        assert!((line.budgeted_amount - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_transactions_yields_no_lines() {
        let db = Database::in_memory().unwrap();
        let result = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 7, 6)
            .unwrap();

        assert!(result.lines.is_empty());
        assert_eq!(result.total_patterns_detected, 0);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        let db = Database::in_memory().unwrap();
        let err = BudgetCalculator::new(&db)
            .calculate_from_history(1, 2026, 13, 6)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_users_are_independent() {
        let db = Database::in_memory().unwrap();
        for month in [1, 3, 5] {
            insert_tx(
                &db,
                1,
                &format!("2026-{:02}-10", month),
                "Municipal Tax",
                -450.0,
                Some(4),
            );
        }
        detect_and_approve_all(&db, 1);

        let other = BudgetCalculator::new(&db)
            .calculate_from_history(2, 2026, 7, 6)
            .unwrap();
        assert!(other.lines.is_empty());
        assert_eq!(other.total_patterns_detected, 0);
    }
}
