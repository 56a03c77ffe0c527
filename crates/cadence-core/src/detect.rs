//! Recurring-expense pattern detection
//!
//! Two stages over a user's windowed transaction history:
//! - grouping into candidate series by description signature, category
//!   pair, and amount bucket
//! - periodicity classification with confidence scoring
//!
//! Detection failures are absences, not errors: a group that is too
//! sparse, mixes signs, has inconsistent month deltas, or scores below
//! its confidence floor simply produces no candidate (logged at debug).

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    CandidatePattern, DetectionData, FlowDirection, GroupKey, Occurrence, Periodicity,
    Transaction, YearMonth,
};

/// Detects recurring charge patterns in a user's transaction history
pub struct PatternDetector<'a> {
    db: &'a Database,
    config: DetectionConfig,
}

impl<'a> PatternDetector<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: DetectionConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: DetectionConfig) -> Self {
        Self { db, config }
    }

    /// Detect candidate patterns in the window ending at the current month
    pub fn detect_patterns(
        &self,
        user_id: i64,
        months_back: Option<u32>,
    ) -> Result<Vec<CandidatePattern>> {
        let end = YearMonth::from_date(Utc::now().date_naive());
        self.detect_patterns_in_window(user_id, end, months_back)
    }

    /// Detect candidate patterns in an explicit window
    ///
    /// The window covers `months_back` months (default from config,
    /// clamped to the configured bound) ending at `end` inclusive.
    /// Candidates are rebuilt from scratch on every call; identical data
    /// yields identical candidates.
    pub fn detect_patterns_in_window(
        &self,
        user_id: i64,
        end: YearMonth,
        months_back: Option<u32>,
    ) -> Result<Vec<CandidatePattern>> {
        let window = months_back
            .unwrap_or(self.config.lookback_months)
            .min(self.config.max_lookback_months);
        if window == 0 {
            return Ok(vec![]);
        }

        let start = end.minus_months(window - 1);
        let range_end = end.plus_months(1).first_day(); // exclusive
        let transactions = self
            .db
            .transactions_in_range(user_id, start.first_day(), range_end)?;
        if transactions.is_empty() {
            return Ok(vec![]);
        }

        let groups = group_transactions(&transactions, self.config.amount_bucket_size);
        let group_count = groups.len();

        let mut candidates: Vec<CandidatePattern> = groups
            .into_iter()
            .filter_map(|(key, txs)| classify_group(key, &txs, window, &self.config))
            .collect();

        // Stable output order keeps re-runs comparable
        candidates.sort_by(|a, b| a.group_key.storage_key().cmp(&b.group_key.storage_key()));

        info!(
            user_id,
            window,
            groups = group_count,
            candidates = candidates.len(),
            "Pattern detection complete"
        );

        Ok(candidates)
    }
}

/// Build the grouping key for one transaction
pub fn group_key_for(tx: &Transaction, bucket_size: f64) -> GroupKey {
    GroupKey {
        signature: normalize_signature(&tx.description),
        category_id: tx.category_id,
        sub_category_id: tx.sub_category_id,
        amount_bucket: amount_bucket(tx.amount, bucket_size),
    }
}

fn signature_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid pattern"))
}

/// Lower-case a description and collapse punctuation/whitespace runs
pub fn normalize_signature(description: &str) -> String {
    signature_pattern()
        .replace_all(&description.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Bucket an amount so near-identical charges group together.
/// Variance inside the bucket is judged at classification time.
fn amount_bucket(amount: f64, bucket_size: f64) -> i64 {
    (amount.abs() / bucket_size).round() as i64
}

fn group_transactions(
    transactions: &[Transaction],
    bucket_size: f64,
) -> HashMap<GroupKey, Vec<&Transaction>> {
    let mut groups: HashMap<GroupKey, Vec<&Transaction>> = HashMap::new();
    for tx in transactions {
        groups
            .entry(group_key_for(tx, bucket_size))
            .or_default()
            .push(tx);
    }
    for txs in groups.values_mut() {
        txs.sort_by_key(|t| (t.date, t.id));
    }
    groups
}

/// Classify one group; `None` means "no pattern", not an error
fn classify_group(
    key: GroupKey,
    transactions: &[&Transaction],
    window_months: u32,
    config: &DetectionConfig,
) -> Option<CandidatePattern> {
    let occurrences: Vec<Occurrence> = transactions
        .iter()
        .map(|t| {
            let ym = YearMonth::from_date(t.date);
            Occurrence {
                year: ym.year,
                month: ym.month,
                amount: t.amount,
                transaction_id: t.id,
            }
        })
        .collect();

    // Distinct calendar months, sorted; recurrence is judged at month grain
    let months: Vec<YearMonth> = occurrences
        .iter()
        .map(|o| YearMonth::new(o.year, o.month))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if months.len() < config.min_occurrences {
        debug!(
            key = %key,
            months = months.len(),
            "Skipping group - too few monthly occurrences"
        );
        return None;
    }

    // A recurring series has one sign; mixed signs are unrelated charges
    // that happen to share a description
    let has_expense = occurrences.iter().any(|o| o.amount < 0.0);
    let has_income = occurrences.iter().any(|o| o.amount > 0.0);
    if has_expense && has_income {
        debug!(key = %key, "Skipping group - mixed-sign amounts");
        return None;
    }

    let periodicity = match periodicity_from_months(&months) {
        Some(p) => p,
        None => {
            debug!(key = %key, "Skipping group - month deltas fit no periodicity");
            return None;
        }
    };

    let amounts: Vec<f64> = occurrences.iter().map(|o| o.amount).collect();
    let amount_mean = mean(&amounts);
    if amount_mean.abs() < f64::EPSILON {
        debug!(key = %key, "Skipping group - zero mean amount");
        return None;
    }
    let amount_stdev = stdev(&amounts, amount_mean);
    let amount_cv = amount_stdev / amount_mean.abs();

    let max_possible = max_possible_occurrences(window_months, periodicity);
    let occurrence_ratio = (months.len() as f64 / max_possible as f64).min(1.0);
    let amount_score = amount_consistency_score(amount_cv, config.amount_cv_threshold);
    let confidence = (occurrence_ratio * amount_score).clamp(0.0, 1.0);

    let floor = config.confidence_floors.floor_for(periodicity);
    if confidence < floor {
        debug!(
            key = %key,
            confidence,
            floor,
            periodicity = %periodicity,
            "Skipping group - confidence below floor"
        );
        return None;
    }

    let scheduled_months = schedule_from(months[0].month, periodicity);
    let direction = if has_income {
        FlowDirection::Income
    } else {
        FlowDirection::Expense
    };

    Some(CandidatePattern {
        group_key: key,
        occurrences,
        periodicity,
        scheduled_months,
        average_amount: amount_mean.abs(),
        direction,
        confidence,
        detection: DetectionData {
            occurrence_count: months.len(),
            window_months,
            max_possible_occurrences: max_possible,
            occurrence_ratio,
            amount_mean,
            amount_stdev,
            amount_cv,
        },
    })
}

/// Strict delta check: every consecutive distinct-month delta must equal
/// one known periodicity exactly. Mixed deltas mean no pattern.
fn periodicity_from_months(months: &[YearMonth]) -> Option<Periodicity> {
    let deltas: Vec<i32> = months.windows(2).map(|w| w[1].index() - w[0].index()).collect();
    let first = *deltas.first()?;
    if deltas.iter().any(|&d| d != first) {
        return None;
    }
    u32::try_from(first).ok().and_then(Periodicity::from_months)
}

/// Most occurrences a periodicity can produce inside a window
fn max_possible_occurrences(window_months: u32, periodicity: Periodicity) -> u32 {
    (window_months - 1) / periodicity.months() + 1
}

/// 1.0 while the coefficient of variation stays under the threshold,
/// then a linear penalty down to 0
fn amount_consistency_score(cv: f64, threshold: f64) -> f64 {
    if cv <= threshold {
        1.0
    } else {
        (1.0 - (cv - threshold)).clamp(0.0, 1.0)
    }
}

/// Project the annual schedule: earliest occurrence month stepped by the
/// periodicity until it wraps (12/P entries, e.g. bi-monthly starting
/// January gives 1,3,5,7,9,11)
fn schedule_from(start_month: u32, periodicity: Periodicity) -> Vec<u32> {
    let step = periodicity.months();
    let mut months: Vec<u32> = (0..12 / step)
        .map(|i| (start_month - 1 + i * step) % 12 + 1)
        .collect();
    months.sort_unstable();
    months
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stdev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
