//! Pattern review command implementations

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use cadence_core::{db::PatternTransition, models::ApprovalStatus, StoredPattern};

use super::core::open_db;
use super::truncate;

pub fn cmd_patterns_list(db_path: &Path, user: i64, status: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;

    let patterns = match status {
        None => {
            let mut all = db.get_pending_patterns(user)?;
            all.extend(db.get_patterns_by_status(user, ApprovalStatus::Approved)?);
            all.extend(db.get_patterns_by_status(user, ApprovalStatus::Rejected)?);
            all
        }
        Some("active") => db.get_active_patterns(user)?,
        Some(s) => {
            let status = ApprovalStatus::from_str(s)
                .map_err(|e| anyhow::anyhow!("{} (expected pending, approved, rejected, or active)", e))?;
            db.get_patterns_by_status(user, status)?
        }
    };

    if patterns.is_empty() {
        println!("No patterns found. Detect some with:");
        println!("  cadence detect --user {} --store", user);
        return Ok(());
    }

    println!();
    println!("📋 Stored Patterns ({} total)", patterns.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for pattern in &patterns {
        print_pattern(pattern);
    }
    println!();
    println!("   Approve with 'cadence patterns approve --id <id>', reject with 'reject'.");

    Ok(())
}

fn print_pattern(pattern: &StoredPattern) {
    let status_icon = match pattern.approval_status {
        ApprovalStatus::Pending => "⏳",
        ApprovalStatus::Approved => "✅",
        ApprovalStatus::Rejected => "🚫",
    };
    println!(
        "   [{}] {} {:>10} │ ${:>9.2} │ {:>4.0}% │ months {} │ {}",
        pattern.id,
        status_icon,
        pattern.periodicity.to_string(),
        pattern.average_amount,
        pattern.confidence * 100.0,
        pattern
            .scheduled_months
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(","),
        truncate(&pattern.group_key, 32),
    );
}

pub fn cmd_patterns_approve(db_path: &Path, id: i64) -> Result<()> {
    let db = open_db(db_path)?;

    match db.approve_pattern(id)? {
        PatternTransition::Applied(pattern) => {
            println!("✅ Approved pattern {}:", pattern.id);
            print_pattern(&pattern);
            println!();
            println!("   This pattern now contributes to budget calculations.");
            Ok(())
        }
        PatternTransition::Conflict(status) => {
            bail!("Pattern {} is already {}, not pending", id, status)
        }
    }
}

pub fn cmd_patterns_reject(db_path: &Path, id: i64) -> Result<()> {
    let db = open_db(db_path)?;

    match db.reject_pattern(id)? {
        PatternTransition::Applied(pattern) => {
            println!("🚫 Rejected pattern {}:", pattern.id);
            print_pattern(&pattern);
            println!();
            println!("   Its transactions will be treated as regular spending.");
            Ok(())
        }
        PatternTransition::Conflict(status) => {
            bail!("Pattern {} is already {}, not pending", id, status)
        }
    }
}
