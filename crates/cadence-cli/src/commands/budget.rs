//! Budget calculation command

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{budget::BudgetCalculator, Config};

use super::core::open_db;

pub fn cmd_budget(
    db_path: &Path,
    config: &Config,
    user: i64,
    year: i32,
    month: u32,
    months: Option<u32>,
    json: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let calculator =
        BudgetCalculator::with_config(&db, config.detection.clone(), config.averaging.clone());

    let window = months.unwrap_or(config.detection.lookback_months);
    let result = calculator
        .calculate_from_history(user, year, month, window)
        .context("Budget calculation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!(
        "💰 Budget for {:04}-{:02} (from the previous {} months)",
        year, month, window
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if result.lines.is_empty() {
        println!("   No transaction history in the analysis window.");
    }

    let mut total = 0.0;
    for line in &result.lines {
        let category = match (line.category_id, line.sub_category_id) {
            (Some(c), Some(s)) => format!("category {}/{}", c, s),
            (Some(c), None) => format!("category {}", c),
            (None, _) => "uncategorized".to_string(),
        };
        let pattern_note = if line.pattern_contribution > 0.0 {
            format!(" (incl. ${:.2} recurring)", line.pattern_contribution)
        } else {
            String::new()
        };
        println!(
            "   {:>16} │ ${:>9.2}{}",
            category, line.budgeted_amount, pattern_note
        );
        println!("                    │   {}", line.averaging.reasoning);
        total += line.budgeted_amount;
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:>16} │ ${:>9.2}", "total", total);
    println!();
    println!(
        "   Patterns: {} stored, {} scheduled this month.",
        result.total_patterns_detected, result.patterns_for_this_month
    );
    if result.requires_approval {
        println!(
            "   ⏳ Pending patterns await review: cadence patterns list --user {} --status pending",
            user
        );
    }

    Ok(())
}
