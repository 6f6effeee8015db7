//! caselens CLI - Support case analytics
//!
//! Usage:
//!   caselens load                     Load data files and show counts
//!   caselens reports                  List available reports
//!   caselens report volume-trend      Run one report
//!   caselens all --insight            Run every report with AI insights
//!   caselens query "SELECT ..."       Ad-hoc read query
//!   caselens backends                 Show model backend status

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
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
    let sources = commands::Sources::new(&config, cli.cases.as_deref(), cli.accounts.as_deref());

    match cli.command {
        Commands::Load => {
            let store = commands::open_store(&sources)?;
            commands::cmd_load(&store)
        }
        Commands::Reports => commands::cmd_reports(),
        Commands::Report {
            name,
            json,
            insight,
        } => {
            let catalog = commands::open_catalog(&sources, &config)?;
            let engine = if insight {
                Some(commands::start_engine(&config).await?)
            } else {
                None
            };
            commands::cmd_report(&catalog, &name, json, engine.as_ref()).await
        }
        Commands::All { insight } => {
            let catalog = commands::open_catalog(&sources, &config)?;
            let engine = if insight {
                Some(commands::start_engine(&config).await?)
            } else {
                None
            };
            commands::cmd_all(&catalog, engine.as_ref()).await
        }
        Commands::Query { sql, json } => {
            let store = commands::open_store(&sources)?;
            commands::cmd_query(&store, &sql, json)
        }
        Commands::Insight { objective, facts } => {
            let engine = commands::start_engine(&config).await?;
            commands::cmd_insight(&engine, &objective, &facts).await
        }
        Commands::Backends => {
            let engine = commands::start_engine(&config).await?;
            commands::cmd_backends(&config, &engine)
        }
    }
}
