//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` - Resolve the configuration file
//! - `Sources` / `open_store` / `open_catalog` - Load the data files
//! - `start_engine` - Select a model backend
//! - `cmd_load` - Show what was loaded

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use caselens_core::{Config, InsightEngine, RecordStore, ReportCatalog, SourceLocator};

/// Load configuration (explicit path, then env var, then user dir, then defaults)
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

/// Where to read the two collections from
pub struct Sources {
    pub cases: PathBuf,
    pub accounts: PathBuf,
    pub locator: SourceLocator,
}

impl Sources {
    /// Command-line paths win over the configured file names; configured
    /// search dirs are tried before the standard ones
    pub fn new(config: &Config, cases: Option<&Path>, accounts: Option<&Path>) -> Self {
        Self {
            cases: cases
                .map(Path::to_path_buf)
                .unwrap_or_else(|| config.data.cases_file.clone()),
            accounts: accounts
                .map(Path::to_path_buf)
                .unwrap_or_else(|| config.data.accounts_file.clone()),
            locator: SourceLocator::standard().prepend(config.data.search_dirs.clone()),
        }
    }
}

/// Load both collections into a fresh store
pub fn open_store(sources: &Sources) -> Result<RecordStore> {
    let mut store = RecordStore::new();
    store
        .load_with(&sources.cases, &sources.accounts, &sources.locator)
        .context("Failed to load data files")?;
    Ok(store)
}

pub fn open_catalog(sources: &Sources, config: &Config) -> Result<ReportCatalog> {
    let store = open_store(sources)?;
    Ok(ReportCatalog::new(store, config.reports.clone()))
}

/// Select a model backend and load the insight prompt
pub async fn start_engine(config: &Config) -> Result<InsightEngine> {
    InsightEngine::start(&config.insight)
        .await
        .context("Failed to start insight engine")
}

pub fn cmd_load(store: &RecordStore) -> Result<()> {
    let summary = store
        .summary()
        .context("Record store is not loaded")?;

    println!("📂 Data loaded");
    println!("   Cases:    {:>8}  ({})", summary.cases, summary.cases_path.display());
    println!(
        "   Accounts: {:>8}  ({})",
        summary.accounts,
        summary.accounts_path.display()
    );
    if summary.skipped_cases > 0 {
        println!(
            "   Skipped:  {:>8}  (cases with inconsistent closed dates)",
            summary.skipped_cases
        );
    }

    if summary.cases == 0 {
        println!();
        println!("⚠️  The cases file is empty; every report will be blank.");
    }

    println!();
    println!("Next steps:");
    println!("  1. List reports: caselens reports");
    println!("  2. Run everything: caselens all --insight");

    Ok(())
}
