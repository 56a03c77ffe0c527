//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Transaction inserts and window queries
//! - `patterns` - Stored pattern persistence and the approval state machine

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod patterns;
mod transactions;

#[cfg(test)]
mod tests;

pub use patterns::PatternTransition;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool at the given path
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a unique temp file rather than `:memory:` because every
    /// pooled connection to `:memory:` would open its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/cadence_test_{}_{}.db", std::process::id(), id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for grouped queries)
            PRAGMA temp_store = MEMORY;

            -- Transactions (imported ledger rows)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                date DATE NOT NULL,
                processed_date DATE,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                category_id INTEGER,
                sub_category_id INTEGER,
                import_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Index for the detection/budget window queries
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id, sub_category_id);

            -- Recurring patterns (detected candidates with approval state)
            CREATE TABLE IF NOT EXISTS recurring_patterns (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                group_key TEXT NOT NULL,
                category_id INTEGER,
                sub_category_id INTEGER,
                periodicity INTEGER NOT NULL,          -- recurrence interval in months (2, 3, 12)
                scheduled_months TEXT NOT NULL,        -- JSON array of calendar months 1-12
                average_amount REAL NOT NULL,          -- mean charge magnitude
                direction TEXT NOT NULL,               -- expense, income
                confidence REAL NOT NULL,
                detection_data TEXT,                   -- JSON of supporting statistics
                approval_status TEXT NOT NULL DEFAULT 'pending',
                is_active BOOLEAN NOT NULL DEFAULT 0,
                approved_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, group_key)
            );

            CREATE INDEX IF NOT EXISTS idx_patterns_user_status ON recurring_patterns(user_id, approval_status);
            CREATE INDEX IF NOT EXISTS idx_patterns_user_active ON recurring_patterns(user_id, is_active);
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}
