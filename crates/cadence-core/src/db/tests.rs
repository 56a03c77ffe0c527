//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_new_tx(date: &str, description: &str, amount: f64, hash: &str) -> NewTransaction {
        NewTransaction {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            processed_date: None,
            description: description.to_string(),
            amount,
            category_id: Some(4),
            sub_category_id: None,
            import_hash: hash.to_string(),
        }
    }

    fn make_candidate(signature: &str, bucket: i64) -> CandidatePattern {
        CandidatePattern {
            group_key: GroupKey {
                signature: signature.to_string(),
                category_id: Some(4),
                sub_category_id: None,
                amount_bucket: bucket,
            },
            occurrences: vec![
                Occurrence {
                    year: 2026,
                    month: 1,
                    amount: -450.0,
                    transaction_id: 1,
                },
                Occurrence {
                    year: 2026,
                    month: 3,
                    amount: -450.0,
                    transaction_id: 2,
                },
                Occurrence {
                    year: 2026,
                    month: 5,
                    amount: -450.0,
                    transaction_id: 3,
                },
            ],
            periodicity: Periodicity::BiMonthly,
            scheduled_months: vec![1, 3, 5, 7, 9, 11],
            average_amount: 450.0,
            direction: FlowDirection::Expense,
            confidence: 1.0,
            detection: DetectionData {
                occurrence_count: 3,
                window_months: 6,
                max_possible_occurrences: 3,
                occurrence_ratio: 1.0,
                amount_mean: -450.0,
                amount_stdev: 0.0,
                amount_cv: 0.0,
            },
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let transactions = db.list_transactions(1, 10, 0).unwrap();
        assert!(transactions.is_empty());
        assert_eq!(db.count_transactions(1).unwrap(), 0);
    }

    #[test]
    fn test_pattern_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('recurring_patterns') WHERE name IN ('id', 'user_id', 'group_key', 'periodicity', 'scheduled_months', 'average_amount', 'direction', 'confidence', 'approval_status', 'is_active', 'approved_at')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            result, 11,
            "recurring_patterns table should have the expected columns"
        );

        // Unique constraint on (user_id, group_key) backs idempotent storage
        let result = conn.execute(
            "INSERT INTO recurring_patterns (user_id, group_key, periodicity, scheduled_months, average_amount, direction, confidence) VALUES (1, 'k', 2, '[1]', 10.0, 'expense', 0.9)",
            [],
        );
        assert!(result.is_ok());
        let result = conn.execute(
            "INSERT INTO recurring_patterns (user_id, group_key, periodicity, scheduled_months, average_amount, direction, confidence) VALUES (1, 'k', 2, '[1]', 10.0, 'expense', 0.9)",
            [],
        );
        assert!(result.is_err(), "Duplicate (user_id, group_key) should fail");
    }

    #[test]
    fn test_insert_transaction_dedup() {
        let db = Database::in_memory().unwrap();

        let tx = make_new_tx("2026-01-15", "MUNICIPAL TAX", -450.0, "hash_1");
        let id = db.insert_transaction(1, &tx).unwrap();
        assert!(id.is_some());

        // Same import hash is silently skipped
        let dup = db.insert_transaction(1, &tx).unwrap();
        assert!(dup.is_none());
        assert_eq!(db.count_transactions(1).unwrap(), 1);
    }

    #[test]
    fn test_transactions_in_range_bounds() {
        let db = Database::in_memory().unwrap();

        db.insert_transaction(1, &make_new_tx("2025-12-31", "A", -10.0, "h1"))
            .unwrap();
        db.insert_transaction(1, &make_new_tx("2026-01-01", "B", -10.0, "h2"))
            .unwrap();
        db.insert_transaction(1, &make_new_tx("2026-03-31", "C", -10.0, "h3"))
            .unwrap();
        db.insert_transaction(1, &make_new_tx("2026-04-01", "D", -10.0, "h4"))
            .unwrap();
        // Another user's rows never leak in
        db.insert_transaction(2, &make_new_tx("2026-02-01", "E", -10.0, "h5"))
            .unwrap();

        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let rows = db.transactions_in_range(1, start, end).unwrap();

        let descriptions: Vec<_> = rows.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["B", "C"]);
    }

    #[test]
    fn test_store_detected_patterns_idempotent() {
        let db = Database::in_memory().unwrap();

        let candidates = vec![make_candidate("municipal tax", 45)];
        let stored = db.store_detected_patterns(1, &candidates).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].approval_status, ApprovalStatus::Pending);
        assert!(!stored[0].is_active);
        assert!(stored[0].approved_at.is_none());

        // Re-storing the same detection run creates nothing new
        let again = db.store_detected_patterns(1, &candidates).unwrap();
        assert!(again.is_empty());
        assert_eq!(db.count_patterns(1).unwrap(), 1);

        // A different user gets their own row for the same key
        let other = db.store_detected_patterns(2, &candidates).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_stored_pattern_round_trip() {
        let db = Database::in_memory().unwrap();

        let stored = db
            .store_detected_patterns(1, &[make_candidate("car insurance", 120)])
            .unwrap();
        let pattern = db.get_pattern(stored[0].id).unwrap().unwrap();

        assert_eq!(pattern.periodicity, Periodicity::BiMonthly);
        assert_eq!(pattern.scheduled_months, vec![1, 3, 5, 7, 9, 11]);
        assert_eq!(pattern.direction, FlowDirection::Expense);
        assert!((pattern.average_amount - 450.0).abs() < f64::EPSILON);
        let detection = pattern.detection.unwrap();
        assert_eq!(detection.occurrence_count, 3);
    }

    #[test]
    fn test_approve_sets_active_and_timestamp() {
        let db = Database::in_memory().unwrap();
        let stored = db
            .store_detected_patterns(1, &[make_candidate("municipal tax", 45)])
            .unwrap();

        match db.approve_pattern(stored[0].id).unwrap() {
            PatternTransition::Applied(pattern) => {
                assert_eq!(pattern.approval_status, ApprovalStatus::Approved);
                assert!(pattern.is_active);
                assert!(pattern.approved_at.is_some());
            }
            PatternTransition::Conflict(status) => {
                panic!("Expected approval to apply, got conflict with {}", status)
            }
        }

        assert_eq!(db.get_active_patterns(1).unwrap().len(), 1);
        assert!(db.get_pending_patterns(1).unwrap().is_empty());
    }

    #[test]
    fn test_reject_keeps_inactive() {
        let db = Database::in_memory().unwrap();
        let stored = db
            .store_detected_patterns(1, &[make_candidate("gym", 5)])
            .unwrap();

        match db.reject_pattern(stored[0].id).unwrap() {
            PatternTransition::Applied(pattern) => {
                assert_eq!(pattern.approval_status, ApprovalStatus::Rejected);
                assert!(!pattern.is_active);
                assert!(pattern.approved_at.is_none());
            }
            PatternTransition::Conflict(status) => {
                panic!("Expected rejection to apply, got conflict with {}", status)
            }
        }

        assert!(db.get_active_patterns(1).unwrap().is_empty());
    }

    #[test]
    fn test_second_resolution_is_a_conflict() {
        let db = Database::in_memory().unwrap();
        let stored = db
            .store_detected_patterns(1, &[make_candidate("municipal tax", 45)])
            .unwrap();
        let id = stored[0].id;

        assert!(matches!(
            db.approve_pattern(id).unwrap(),
            PatternTransition::Applied(_)
        ));

        // A second approve or a late reject both observe the resolved state
        match db.approve_pattern(id).unwrap() {
            PatternTransition::Conflict(status) => assert_eq!(status, ApprovalStatus::Approved),
            PatternTransition::Applied(_) => panic!("Second approve should conflict"),
        }
        match db.reject_pattern(id).unwrap() {
            PatternTransition::Conflict(status) => assert_eq!(status, ApprovalStatus::Approved),
            PatternTransition::Applied(_) => panic!("Reject after approve should conflict"),
        }

        // Still active, still exactly one pattern
        assert_eq!(db.get_active_patterns(1).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_pattern_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = db.approve_pattern(999).unwrap_err();
        assert!(matches!(err, crate::error::Error::NotFound(_)));
    }

    #[test]
    fn test_has_pending_patterns() {
        let db = Database::in_memory().unwrap();
        assert!(!db.has_pending_patterns(1).unwrap());

        let stored = db
            .store_detected_patterns(1, &[make_candidate("municipal tax", 45)])
            .unwrap();
        assert!(db.has_pending_patterns(1).unwrap());

        db.approve_pattern(stored[0].id).unwrap();
        assert!(!db.has_pending_patterns(1).unwrap());
    }
}
