//! Mock backend for testing
//!
//! Deterministic replies with no I/O. Useful for unit tests and offline demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::InsightError;

use super::{GenerationRequest, ModelBackend};

#[derive(Clone, Default)]
pub struct MockBackend {
    /// Fixed reply; when unset the reply is derived from the request
    reply: Option<String>,
    /// Fail this many calls before succeeding
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `reply`
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Fail the first `n` calls with a generation error
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures: n,
            ..Self::default()
        }
    }

    /// Number of generate calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InsightError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(InsightError::GenerationFailed(format!(
                "mock failure {} of {}",
                call + 1,
                self.failures
            )));
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }

        let role = request
            .system
            .split_terminator(['.', '\n'])
            .next()
            .unwrap_or_default()
            .trim();
        let facts = request.user.lines().filter(|l| !l.trim().is_empty()).count();
        Ok(format!(
            "Mock analysis ({}): reviewed {} line(s) of data. No action required.",
            role, facts
        ))
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn describe(&self) -> String {
        "deterministic mock replies".to_string()
    }
}
