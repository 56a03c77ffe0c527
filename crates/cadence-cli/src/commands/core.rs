//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` / `load_config` - Shared utilities
//! - `cmd_init` - Initialize the database
//! - `cmd_detect` - Run pattern detection

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{db::Database, detect::PatternDetector, Config};

use super::truncate;

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Load thresholds: built-in defaults plus an optional override file
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    Config::load(override_path).context("Failed to load configuration")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: cadence import --file ledger.csv --user 1");
    println!("  2. Detect patterns:     cadence detect --user 1 --store");

    Ok(())
}

pub fn cmd_detect(
    db_path: &Path,
    config: &Config,
    user: i64,
    months: Option<u32>,
    store: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let detector = PatternDetector::with_config(&db, config.detection.clone());

    println!("🔍 Detecting recurring patterns for user {}...", user);
    let candidates = detector
        .detect_patterns(user, months)
        .context("Pattern detection failed")?;

    if candidates.is_empty() {
        println!("No recurring patterns found.");
        return Ok(());
    }

    println!();
    println!("📈 Detected Patterns");
    println!("   ─────────────────────────────────────────────────────────────");
    for candidate in &candidates {
        println!(
            "   {:>10} │ ${:>9.2} │ {:>4.0}% │ months {} │ {}",
            candidate.periodicity.to_string(),
            candidate.average_amount,
            candidate.confidence * 100.0,
            candidate
                .scheduled_months
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(","),
            truncate(&candidate.group_key.signature, 32),
        );
    }

    if store {
        let stored = db
            .store_detected_patterns(user, &candidates)
            .context("Failed to store patterns")?;
        println!();
        println!(
            "✅ Stored {} new pattern(s) as pending ({} already known).",
            stored.len(),
            candidates.len() - stored.len()
        );
        if !stored.is_empty() {
            println!("   Review with: cadence patterns list --user {}", user);
        }
    } else {
        println!();
        println!("   Re-run with --store to persist these for approval.");
    }

    Ok(())
}
