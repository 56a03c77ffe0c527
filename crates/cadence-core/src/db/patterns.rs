//! Stored pattern operations and the approval state machine
//!
//! Approve and reject race on the pending guard at the SQL layer: the
//! UPDATE is conditioned on `approval_status = 'pending'`, so the loser
//! of a concurrent resolution observes zero changed rows and receives a
//! `Conflict` instead of corrupting state.

use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    ApprovalAction, ApprovalStatus, CandidatePattern, DetectionData, FlowDirection, Periodicity,
    StoredPattern,
};

/// Outcome of an approve/reject call
#[derive(Debug, Clone)]
pub enum PatternTransition {
    /// The transition happened; carries the updated pattern
    Applied(StoredPattern),
    /// The pattern had already been resolved; carries its current status
    Conflict(ApprovalStatus),
}

impl Database {
    /// Persist new candidates as pending patterns
    ///
    /// Idempotent per (user, group key): candidates whose key is already
    /// stored are skipped, so re-running detection never creates
    /// duplicates. Individual failures are logged and excluded from the
    /// returned set while the remaining candidates still persist.
    pub fn store_detected_patterns(
        &self,
        user_id: i64,
        candidates: &[CandidatePattern],
    ) -> Result<Vec<StoredPattern>> {
        let mut stored = Vec::new();

        for candidate in candidates {
            match self.store_candidate(user_id, candidate) {
                Ok(Some(pattern)) => stored.push(pattern),
                Ok(None) => {
                    debug!(
                        user_id,
                        key = %candidate.group_key,
                        "Pattern already stored, skipping"
                    );
                }
                Err(e) => {
                    warn!(
                        user_id,
                        key = %candidate.group_key,
                        error = %e,
                        "Failed to store candidate pattern"
                    );
                }
            }
        }

        Ok(stored)
    }

    fn store_candidate(
        &self,
        user_id: i64,
        candidate: &CandidatePattern,
    ) -> Result<Option<StoredPattern>> {
        let conn = self.conn()?;
        let key = candidate.group_key.storage_key();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM recurring_patterns WHERE user_id = ? AND group_key = ?",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Ok(None);
        }

        let scheduled_months = serde_json::to_string(&candidate.scheduled_months)?;
        let detection_data = serde_json::to_string(&candidate.detection)?;

        conn.execute(
            r#"
            INSERT INTO recurring_patterns
                (user_id, group_key, category_id, sub_category_id, periodicity, scheduled_months,
                 average_amount, direction, confidence, detection_data, approval_status, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0)
            "#,
            params![
                user_id,
                key,
                candidate.group_key.category_id,
                candidate.group_key.sub_category_id,
                candidate.periodicity.months(),
                scheduled_months,
                candidate.average_amount,
                candidate.direction.as_str(),
                candidate.confidence,
                detection_data,
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);

        let pattern = self
            .get_pattern(id)?
            .ok_or_else(|| Error::NotFound(format!("Pattern {} after insert", id)))?;
        Ok(Some(pattern))
    }

    /// Fetch a single pattern by id
    pub fn get_pattern(&self, id: i64) -> Result<Option<StoredPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                &format!("{} WHERE id = ?", PATTERN_SELECT),
                params![id],
                row_to_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    /// Patterns for a user in a given approval state, oldest first
    pub fn get_patterns_by_status(
        &self,
        user_id: i64,
        status: ApprovalStatus,
    ) -> Result<Vec<StoredPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? AND approval_status = ? ORDER BY created_at, id",
            PATTERN_SELECT
        ))?;

        let patterns = stmt
            .query_map(params![user_id, status.as_str()], row_to_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    /// Patterns awaiting a user decision
    pub fn get_pending_patterns(&self, user_id: i64) -> Result<Vec<StoredPattern>> {
        self.get_patterns_by_status(user_id, ApprovalStatus::Pending)
    }

    /// Approved patterns that contribute to budget calculations
    pub fn get_active_patterns(&self, user_id: i64) -> Result<Vec<StoredPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? AND is_active = 1 ORDER BY created_at, id",
            PATTERN_SELECT
        ))?;

        let patterns = stmt
            .query_map(params![user_id], row_to_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    /// Total stored patterns for a user, regardless of state
    pub fn count_patterns(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM recurring_patterns WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn has_pending_patterns(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM recurring_patterns WHERE user_id = ? AND approval_status = 'pending' LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Approve a pending pattern: sets is_active and approved_at
    pub fn approve_pattern(&self, id: i64) -> Result<PatternTransition> {
        self.resolve_pattern(id, ApprovalAction::Approve)
    }

    /// Reject a pending pattern: is_active stays false
    pub fn reject_pattern(&self, id: i64) -> Result<PatternTransition> {
        self.resolve_pattern(id, ApprovalAction::Reject)
    }

    fn resolve_pattern(&self, id: i64, action: ApprovalAction) -> Result<PatternTransition> {
        let conn = self.conn()?;

        // Compare-and-swap on the pending guard
        let changed = match action {
            ApprovalAction::Approve => conn.execute(
                r#"
                UPDATE recurring_patterns
                SET approval_status = 'approved', is_active = 1, approved_at = CURRENT_TIMESTAMP
                WHERE id = ? AND approval_status = 'pending'
                "#,
                params![id],
            )?,
            ApprovalAction::Reject => conn.execute(
                r#"
                UPDATE recurring_patterns
                SET approval_status = 'rejected'
                WHERE id = ? AND approval_status = 'pending'
                "#,
                params![id],
            )?,
        };
        drop(conn);

        if changed == 1 {
            let pattern = self
                .get_pattern(id)?
                .ok_or_else(|| Error::NotFound(format!("Pattern {}", id)))?;
            return Ok(PatternTransition::Applied(pattern));
        }

        // Lost the pending guard: either already resolved or unknown id
        match self.get_pattern(id)? {
            Some(pattern) => {
                debug!(
                    pattern_id = id,
                    status = %pattern.approval_status,
                    "Approval transition refused - pattern not pending"
                );
                Ok(PatternTransition::Conflict(pattern.approval_status))
            }
            None => Err(Error::NotFound(format!("Pattern {}", id))),
        }
    }
}

const PATTERN_SELECT: &str = r#"
    SELECT id, user_id, group_key, category_id, sub_category_id, periodicity, scheduled_months,
           average_amount, direction, confidence, detection_data, approval_status, is_active,
           approved_at, created_at
    FROM recurring_patterns
"#;

fn row_to_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredPattern> {
    let periodicity_months: u32 = row.get(5)?;
    let scheduled_str: String = row.get(6)?;
    let direction_str: String = row.get(8)?;
    let detection_str: Option<String> = row.get(10)?;
    let status_str: String = row.get(11)?;
    let approved_at_str: Option<String> = row.get(13)?;
    let created_at_str: String = row.get(14)?;

    let scheduled_months: Vec<u32> = serde_json::from_str(&scheduled_str).unwrap_or_default();
    let detection: Option<DetectionData> =
        detection_str.and_then(|s| serde_json::from_str(&s).ok());

    Ok(StoredPattern {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_key: row.get(2)?,
        category_id: row.get(3)?,
        sub_category_id: row.get(4)?,
        periodicity: Periodicity::from_months(periodicity_months)
            .unwrap_or(Periodicity::BiMonthly),
        scheduled_months,
        average_amount: row.get(7)?,
        direction: match direction_str.as_str() {
            "income" => FlowDirection::Income,
            _ => FlowDirection::Expense,
        },
        confidence: row.get(9)?,
        detection,
        approval_status: match status_str.as_str() {
            "approved" => ApprovalStatus::Approved,
            "rejected" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Pending,
        },
        is_active: row.get(12)?,
        approved_at: approved_at_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}
