//! Ledger CSV import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{import::parse_ledger_csv, Config};

use super::core::{cmd_detect, open_db};

pub fn cmd_import(
    db_path: &Path,
    config: &Config,
    file: &Path,
    user: i64,
    detect_after: bool,
) -> Result<()> {
    let db = open_db(db_path)?;

    println!("📥 Importing {} for user {}...", file.display(), user);

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let transactions = parse_ledger_csv(reader).context("Failed to parse ledger CSV")?;

    let mut imported = 0;
    let mut skipped = 0;
    for tx in &transactions {
        match db
            .insert_transaction(user, tx)
            .context("Failed to insert transaction")?
        {
            Some(_) => imported += 1,
            None => skipped += 1,
        }
    }

    println!(
        "✅ Imported {} transaction(s), skipped {} duplicate(s).",
        imported, skipped
    );

    if detect_after {
        println!();
        cmd_detect(db_path, config, user, None, true)?;
    }

    Ok(())
}
