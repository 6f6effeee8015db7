//! Insight generation over pluggable language-model backends
//!
//! # Architecture
//!
//! - `ModelBackend` trait: one generation request in, text out
//! - `Backend` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `CloudBackend` (hosted `generateContent` API),
//!   `LocalBackend` (quantized weights served by a llama.cpp server process),
//!   `MockBackend`
//! - `select_backend`: ordered fallback chain run once at startup
//! - `InsightEngine`: builds the prompt from a context package, dispatches,
//!   cleans up the reply
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = InsightEngine::start(&config.insight).await;
//! match engine.analyze(&report.context).await {
//!     Ok(text) => println!("{}", text),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

mod cloud;
mod engine;
mod local;
mod mock;
mod sanitize;
mod select;

pub use cloud::CloudBackend;
pub use engine::InsightEngine;
pub use local::{resolve_weights, weight_dirs, LocalBackend};
pub use mock::MockBackend;
pub use sanitize::sanitize;
pub use select::{select_backend, BackendAttempt, Selection};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::GenerationParams;
use crate::error::InsightError;

/// A fully formatted generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Instructions (role, rules, output contract)
    pub system: String,
    /// The data to analyze
    pub user: String,
    pub params: GenerationParams,
}

/// HTTP client with a per-request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("HTTP client could not be built: {}", e))
}

/// Trait defining the interface for all model backends
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one completion and return the raw text
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InsightError>;

    /// Short backend name (for logging and status)
    fn name(&self) -> &'static str;

    /// Model and endpoint details (for status display)
    fn describe(&self) -> String;
}

/// Concrete backend enum
///
/// `Unavailable` carries the reason each candidate was skipped so callers can
/// explain why analysis is off.
#[derive(Clone)]
pub enum Backend {
    Cloud(CloudBackend),
    Local(LocalBackend),
    Mock(MockBackend),
    Unavailable(Vec<String>),
}

impl Backend {
    pub fn is_available(&self) -> bool {
        !matches!(self, Backend::Unavailable(_))
    }
}

#[async_trait]
impl ModelBackend for Backend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InsightError> {
        match self {
            Backend::Cloud(b) => b.generate(request).await,
            Backend::Local(b) => b.generate(request).await,
            Backend::Mock(b) => b.generate(request).await,
            Backend::Unavailable(reasons) => Err(InsightError::BackendUnavailable(
                if reasons.is_empty() {
                    "no model backend is configured".to_string()
                } else {
                    reasons.join("; ")
                },
            )),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Cloud(b) => b.name(),
            Backend::Local(b) => b.name(),
            Backend::Mock(b) => b.name(),
            Backend::Unavailable(_) => "unavailable",
        }
    }

    fn describe(&self) -> String {
        match self {
            Backend::Cloud(b) => b.describe(),
            Backend::Local(b) => b.describe(),
            Backend::Mock(b) => b.describe(),
            Backend::Unavailable(reasons) => format!("no backend ({})", reasons.join("; ")),
        }
    }
}
