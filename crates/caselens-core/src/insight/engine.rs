//! Insight engine - turns a context package into an executive summary

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{GenerationParams, InsightConfig};
use crate::error::{InsightError, Result};
use crate::prompts::{Prompt, PromptId, PromptLibrary};
use crate::reports::ContextPackage;

use super::sanitize::sanitize;
use super::select::{select_backend, BackendAttempt, Selection};
use super::{Backend, GenerationRequest, ModelBackend};

/// Generates insights through the backend chosen at startup
///
/// Holds no per-call state: a failed call leaves the engine usable.
#[derive(Clone)]
pub struct InsightEngine {
    backend: Backend,
    attempts: Vec<BackendAttempt>,
    params: GenerationParams,
    prompt: Prompt,
}

impl InsightEngine {
    /// Select a backend from config and load the prompt (override or default)
    pub async fn start(config: &InsightConfig) -> Result<Self> {
        let prompt = load_prompt(PromptLibrary::new())?;
        let selection = select_backend(config).await;
        Ok(Self::from_selection(
            selection,
            config.generation.clone(),
            prompt,
        ))
    }

    /// Engine around an already-built backend, using the embedded prompt
    pub fn with_backend(backend: Backend, params: GenerationParams) -> Result<Self> {
        Self::with_prompts(backend, params, PromptLibrary::embedded_only())
    }

    /// Engine with a caller-supplied prompt library
    pub fn with_prompts(
        backend: Backend,
        params: GenerationParams,
        prompts: PromptLibrary,
    ) -> Result<Self> {
        Ok(Self::from_selection(
            Selection {
                backend,
                attempts: Vec::new(),
            },
            params,
            load_prompt(prompts)?,
        ))
    }

    fn from_selection(selection: Selection, params: GenerationParams, prompt: Prompt) -> Self {
        Self {
            backend: selection.backend,
            attempts: selection.attempts,
            params,
            prompt,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// How each candidate fared during selection
    pub fn attempts(&self) -> &[BackendAttempt] {
        &self.attempts
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Build the request sent to the backend
    pub fn build_request(&self, objective: &str, facts: &str) -> GenerationRequest {
        let vars = HashMap::from([("objective", objective), ("facts", facts)]);
        GenerationRequest {
            system: self.prompt.render_system(&vars),
            user: self.prompt.render_user(&vars),
            params: self.params.clone(),
        }
    }

    /// Generate a plain-text insight for an objective and its facts
    pub async fn generate(
        &self,
        objective: &str,
        facts: &str,
    ) -> std::result::Result<String, InsightError> {
        let request = self.build_request(objective, facts);
        debug!(
            backend = self.backend.name(),
            system = %request.system,
            user = %request.user,
            "Generating insight"
        );

        let raw = self.backend.generate(&request).await?;
        let text = sanitize(&raw);
        if text.is_empty() {
            return Err(InsightError::GenerationFailed(
                "model returned only formatting".to_string(),
            ));
        }
        Ok(text)
    }

    /// Generate an insight for a report's context package
    pub async fn analyze(
        &self,
        context: &ContextPackage,
    ) -> std::result::Result<String, InsightError> {
        self.generate(&context.objective, &context.facts).await
    }
}

/// Load the insight prompt, falling back to the embedded copy if an override
/// is broken
fn load_prompt(mut library: PromptLibrary) -> Result<Prompt> {
    let has_override_dir = library.override_dir().is_some();
    match library.get(PromptId::InsightReport) {
        Ok(prompt) => Ok(prompt.clone()),
        Err(e) if has_override_dir => {
            warn!(error = %e, "Prompt override unusable, using embedded prompt");
            PromptLibrary::embedded_only()
                .get(PromptId::InsightReport)
                .cloned()
        }
        Err(e) => Err(e),
    }
}
