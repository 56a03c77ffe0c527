//! Domain models for cadence

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Owner of the transaction; detection never crosses users
    pub user_id: i64,
    pub date: NaiveDate,
    /// Settlement date, when the bank distinguishes it from the purchase date
    pub processed_date: Option<NaiveDate>,
    pub description: String,
    /// Negative = expense, positive = income
    pub amount: f64,
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    /// Hash for deduplication
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A new transaction to be imported (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub processed_date: Option<NaiveDate>,
    pub description: String,
    pub amount: f64,
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    pub import_hash: String,
}

/// A calendar month, the grain at which recurrence is judged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct YearMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Total month index, so deltas are plain subtraction across year breaks
    pub fn index(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }

    pub fn from_index(index: i32) -> Self {
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn minus_months(&self, months: u32) -> Self {
        Self::from_index(self.index() - months as i32)
    }

    pub fn plus_months(&self, months: u32) -> Self {
        Self::from_index(self.index() + months as i32)
    }

    /// First day of the month, for date-range queries
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Grouping key for candidate recurring series
///
/// Two transactions land in the same group only when the normalized
/// description, category pair, and amount bucket all match. Amount variance
/// inside the bucket is judged later, at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Lower-cased description with punctuation/whitespace runs collapsed
    pub signature: String,
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    pub amount_bucket: i64,
}

impl GroupKey {
    /// Stable encoding used as the persistence key
    pub fn storage_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.signature,
            self.category_id.map(|id| id.to_string()).unwrap_or_default(),
            self.sub_category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            self.amount_bucket
        )
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Recurrence interval of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    /// Every 2 months
    BiMonthly,
    /// Every 3 months
    Quarterly,
    /// Every 12 months
    Yearly,
}

impl Periodicity {
    /// Interval length in months; always divides 12
    pub fn months(&self) -> u32 {
        match self {
            Self::BiMonthly => 2,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    pub fn from_months(months: u32) -> Option<Self> {
        match months {
            2 => Some(Self::BiMonthly),
            3 => Some(Self::Quarterly),
            12 => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BiMonthly => "bimonthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Periodicity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bimonthly" | "bi-monthly" => Ok(Self::BiMonthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown periodicity: {}", s)),
        }
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a pattern's charges are spending or income
///
/// Average amounts are stored as magnitudes; the sign lives here. Groups
/// mixing both signs are rejected at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Expense,
    Income,
}

impl FlowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for FlowDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown flow direction: {}", s)),
        }
    }
}

impl std::fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Approval state of a stored pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// A pattern contributes to budgets only while approved
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Apply an approval action.
    ///
    /// Transitions are one-directional: only a pending pattern moves.
    /// Anything else reports the state it was found in instead of
    /// silently ignoring the action.
    pub fn transition(self, action: ApprovalAction) -> TransitionResult {
        match self {
            Self::Pending => TransitionResult::Applied(match action {
                ApprovalAction::Approve => Self::Approved,
                ApprovalAction::Reject => Self::Rejected,
            }),
            resolved => TransitionResult::Conflict(resolved),
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested change to a pattern's approval state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

/// Outcome of applying an approval action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// The action was valid; carries the new state
    Applied(ApprovalStatus),
    /// The pattern was not pending; carries the state it was found in
    Conflict(ApprovalStatus),
}

/// One transaction's contribution to a candidate pattern
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Occurrence {
    pub year: i32,
    pub month: u32,
    pub amount: f64,
    pub transaction_id: i64,
}

/// Supporting statistics captured at detection time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionData {
    /// Distinct calendar months the group occurred in
    pub occurrence_count: usize,
    pub window_months: u32,
    /// Most occurrences the periodicity could have produced in the window
    pub max_possible_occurrences: u32,
    pub occurrence_ratio: f64,
    /// Mean of the signed occurrence amounts
    pub amount_mean: f64,
    pub amount_stdev: f64,
    /// Coefficient of variation (stdev / |mean|)
    pub amount_cv: f64,
}

/// An in-memory detection result
///
/// Candidates are rebuilt fresh on every detection run and are never
/// persisted directly; storage goes through the pattern store, which
/// assigns the approval state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePattern {
    pub group_key: GroupKey,
    /// Date-ordered; all share the group key by construction
    pub occurrences: Vec<Occurrence>,
    pub periodicity: Periodicity,
    /// Calendar months (1-12) the pattern is expected to charge in,
    /// sorted; fully determined by the periodicity and earliest occurrence
    pub scheduled_months: Vec<u32>,
    /// Mean charge magnitude; `direction` carries the sign
    pub average_amount: f64,
    pub direction: FlowDirection,
    /// 0.0-1.0
    pub confidence: f64,
    pub detection: DetectionData,
}

impl CandidatePattern {
    pub fn is_scheduled_in(&self, month: u32) -> bool {
        self.scheduled_months.contains(&month)
    }
}

/// A persisted pattern carrying an approval state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPattern {
    pub id: i64,
    pub user_id: i64,
    /// Encoded `GroupKey::storage_key`; unique per user
    pub group_key: String,
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    pub periodicity: Periodicity,
    pub scheduled_months: Vec<u32>,
    pub average_amount: f64,
    pub direction: FlowDirection,
    pub confidence: f64,
    pub detection: Option<DetectionData>,
    pub approval_status: ApprovalStatus,
    /// True iff approved
    pub is_active: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StoredPattern {
    pub fn is_scheduled_in(&self, month: u32) -> bool {
        self.scheduled_months.contains(&month)
    }
}
