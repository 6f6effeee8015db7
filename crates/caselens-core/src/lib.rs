//! caselens Core Library
//!
//! Support-case analytics and insight generation:
//! - In-memory record store for cases and accounts (read-only SQL surface)
//! - Catalog of fixed reports, each producing a series and a context package
//! - Insight engine with pluggable model backends (hosted API, local llama.cpp)
//! - Prompt library for customizable insight prompts
//! - Configuration file loading

pub mod config;
pub mod error;
pub mod insight;
pub mod models;
pub mod prompts;
pub mod reports;
pub mod store;

/// Test utilities including the mock model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{BackendKind, Config, GenerationParams, InsightConfig, ReportSettings};
pub use error::{ConfigError, Error, InsightError, LoadError, QueryError, ReportError, Result};
pub use insight::{Backend, BackendAttempt, GenerationRequest, InsightEngine, ModelBackend};
pub use models::{Account, Case, LoadSummary, Severity};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use reports::{ContextPackage, Report, ReportCatalog, ReportKind, Series};
pub use store::{RecordStore, SourceLocator, Table, Value};
