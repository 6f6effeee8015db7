//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// caselens - Support case analytics with AI-written executive summaries
#[derive(Parser)]
#[command(name = "caselens")]
#[command(about = "Support case analytics and insight generation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Cases file (JSON or CSV); overrides [data].cases_file
    #[arg(long, global = true)]
    pub cases: Option<PathBuf>,

    /// Accounts file (JSON or CSV); overrides [data].accounts_file
    #[arg(long, global = true)]
    pub accounts: Option<PathBuf>,

    /// Config file (defaults to $CASELENS_CONFIG, then the user data dir)
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
    /// Load the data files and show record counts
    Load,

    /// List available reports
    Reports,

    /// Run one report
    Report {
        /// Report name, slug or number (see `caselens reports`)
        name: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also generate an AI insight for the report
        #[arg(long)]
        insight: bool,
    },

    /// Run every report
    All {
        /// Also generate an AI insight for each report
        #[arg(long)]
        insight: bool,
    },

    /// Run a read-only SQL query against the loaded data
    ///
    /// Tables: cases (case_sfid, case_product, case_type, case_severity,
    /// case_status, case_created_date, case_closed_date, account_sfid) and
    /// accounts (account_sfid, account_country, account_industry,
    /// account_created_date).
    Query {
        /// SQL statement (SELECT / WITH only)
        sql: String,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a free-form insight from an objective and facts
    Insight {
        /// Instruction for the analyst (role and decision rules)
        #[arg(short, long)]
        objective: String,

        /// Data the insight is based on
        #[arg(short, long)]
        facts: String,
    },

    /// Show the model backend chain and which backend is active
    Backends,
}
