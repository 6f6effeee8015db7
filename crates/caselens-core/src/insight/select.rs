//! Backend fallback chain
//!
//! Candidates are tried once, in configured order. The first one that
//! initializes wins; every attempt is kept so status output can explain why
//! a candidate was skipped.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{BackendKind, InsightConfig};

use super::{Backend, CloudBackend, LocalBackend, MockBackend, ModelBackend};

/// Outcome of trying one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendAttempt {
    pub kind: &'static str,
    /// Backend description on success, skip reason on failure
    pub detail: String,
    pub selected: bool,
}

/// Chosen backend plus the record of how it was chosen
#[derive(Clone)]
pub struct Selection {
    pub backend: Backend,
    pub attempts: Vec<BackendAttempt>,
}

async fn build(kind: BackendKind, config: &InsightConfig) -> Result<Backend, String> {
    match kind {
        BackendKind::Cloud => CloudBackend::from_config(&config.cloud).map(Backend::Cloud),
        BackendKind::Local => LocalBackend::launch(&config.local).await.map(Backend::Local),
        BackendKind::Mock => Ok(Backend::Mock(MockBackend::new())),
    }
}

/// Run the chain; never fails, falls back to `Backend::Unavailable`
pub async fn select_backend(config: &InsightConfig) -> Selection {
    let mut attempts = Vec::new();
    let mut reasons = Vec::new();

    for &kind in &config.backends {
        match build(kind, config).await {
            Ok(backend) => {
                info!(
                    backend = kind.as_str(),
                    detail = %backend.describe(),
                    "Model backend selected"
                );
                attempts.push(BackendAttempt {
                    kind: kind.as_str(),
                    detail: backend.describe(),
                    selected: true,
                });
                return Selection { backend, attempts };
            }
            Err(reason) => {
                warn!(backend = kind.as_str(), reason = %reason, "Model backend skipped");
                reasons.push(format!("{}: {}", kind.as_str(), reason));
                attempts.push(BackendAttempt {
                    kind: kind.as_str(),
                    detail: reason,
                    selected: false,
                });
            }
        }
    }

    warn!("No model backend available; AI analysis is disabled");
    Selection {
        backend: Backend::Unavailable(reasons),
        attempts,
    }
}
