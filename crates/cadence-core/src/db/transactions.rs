//! Transaction operations

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

impl Database {
    /// Insert a transaction (skips duplicates based on import_hash)
    ///
    /// Returns `None` when an identical row was already imported.
    pub fn insert_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        // Check for duplicate
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE import_hash = ?",
                params![tx.import_hash],
                |row| row.get(0),
            )
            .ok();

        if existing.is_some() {
            return Ok(None); // Duplicate, skip
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, date, processed_date, description, amount, category_id, sub_category_id, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.date.to_string(),
                tx.processed_date.map(|d| d.to_string()),
                tx.description,
                tx.amount,
                tx.category_id,
                tx.sub_category_id,
                tx.import_hash,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Transactions for a user with `start <= date < end`, date-ordered
    pub fn transactions_in_range(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, date, processed_date, description, amount, category_id, sub_category_id, import_hash, created_at
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date < ?
            ORDER BY date, id
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![user_id, start.to_string(), end.to_string()],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Most recent transactions for a user
    pub fn list_transactions(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, date, processed_date, description, amount, category_id, sub_category_id, import_hash, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY date DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )?;

        let transactions = stmt
            .query_map(params![user_id, limit, offset], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    pub fn count_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(2)?;
    let processed_str: Option<String> = row.get(3)?;
    let created_at_str: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        processed_date: processed_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        description: row.get(4)?,
        amount: row.get(5)?,
        category_id: row.get(6)?,
        sub_category_id: row.get(7)?,
        import_hash: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        created_at: parse_datetime(&created_at_str),
    })
}
