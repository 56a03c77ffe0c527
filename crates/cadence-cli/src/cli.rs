//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - detect recurring expenses and auto-calculate monthly budgets
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring-expense detection and budget auto-calculation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Threshold config file overriding the built-in defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions from a ledger CSV
    Import {
        /// CSV file to import (Date,Processed Date,Description,Amount,Category,Subcategory)
        #[arg(short, long)]
        file: PathBuf,

        /// User the transactions belong to
        #[arg(short, long)]
        user: i64,

        /// Run pattern detection after import
        #[arg(long)]
        detect: bool,
    },

    /// Detect recurring patterns in a user's history
    Detect {
        /// User to analyze
        #[arg(short, long)]
        user: i64,

        /// Lookback window in months (defaults to the configured window)
        #[arg(short, long)]
        months: Option<u32>,

        /// Store detected candidates as pending patterns
        #[arg(long)]
        store: bool,
    },

    /// Manage stored patterns
    Patterns {
        #[command(subcommand)]
        command: PatternsCommands,
    },

    /// Calculate a month's budget from history
    Budget {
        /// User to calculate for
        #[arg(short, long)]
        user: i64,

        /// Target year
        #[arg(short, long)]
        year: i32,

        /// Target month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Months of history to analyze (defaults to the configured window)
        #[arg(long)]
        months: Option<u32>,

        /// Emit the result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PatternsCommands {
    /// List stored patterns
    List {
        /// User whose patterns to list
        #[arg(short, long)]
        user: i64,

        /// Filter: pending, approved, rejected, active
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Approve a pending pattern so it contributes to budgets
    Approve {
        /// Pattern id
        #[arg(long)]
        id: i64,
    },

    /// Reject a pending pattern
    Reject {
        /// Pattern id
        #[arg(long)]
        id: i64,
    },
}
