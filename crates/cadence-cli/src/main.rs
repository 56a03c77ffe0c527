//! Cadence CLI - recurring-expense detection and budget auto-calculation
//!
//! Usage:
//!   cadence init                          Initialize database
//!   cadence import --file CSV --user 1    Import ledger transactions
//!   cadence detect --user 1 --store       Detect and store recurring patterns
//!   cadence patterns list --user 1        Review detected patterns
//!   cadence budget --user 1 --year 2026 --month 7

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import { file, user, detect } => {
            commands::cmd_import(&cli.db, &config, &file, user, detect)
        }
        Commands::Detect {
            user,
            months,
            store,
        } => commands::cmd_detect(&cli.db, &config, user, months, store),
        Commands::Patterns { command } => match command {
            PatternsCommands::List { user, status } => {
                commands::cmd_patterns_list(&cli.db, user, status.as_deref())
            }
            PatternsCommands::Approve { id } => commands::cmd_patterns_approve(&cli.db, id),
            PatternsCommands::Reject { id } => commands::cmd_patterns_reject(&cli.db, id),
        },
        Commands::Budget {
            user,
            year,
            month,
            months,
            json,
        } => commands::cmd_budget(&cli.db, &config, user, year, month, months, json),
    }
}
