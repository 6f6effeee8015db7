//! Error types for caselens

use std::path::PathBuf;

use thiserror::Error;

/// Failure to bring the record store up from its source files
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{what} file '{name}' not found (searched: {})", format_paths(.searched))]
    NotFound {
        what: &'static str,
        name: String,
        searched: Vec<PathBuf>,
    },

    #[error("Malformed {what} data in {}: {reason}", .path.display())]
    Malformed {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },
}

/// Failure to answer a read query
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Record store not ready: data has not been loaded")]
    NotReady,

    #[error("Invalid query: {0}")]
    Invalid(String),

    #[error("Query execution failed: {0}")]
    Execution(String),
}

/// Failure inside a single report generator
///
/// Internal queries are well-formed, so any of these is a defect. The catalog
/// reports it in place of the chart rather than aborting.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{report}: query failed: {source}")]
    Query {
        report: &'static str,
        #[source]
        source: QueryError,
    },

    #[error("{report}: unexpected result shape: {reason}")]
    Shape { report: &'static str, reason: String },
}

/// Failure to produce an insight
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsightError {
    #[error("AI analysis unavailable: {0}")]
    BackendUnavailable(String),

    #[error("AI analysis failed: {0}")]
    GenerationFailed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Crate-wide error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Insight(#[from] InsightError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
