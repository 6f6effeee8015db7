//! Hosted model backend (Gemini `generateContent` API)
//!
//! The API key is read from the environment variable named in
//! `[insight.cloud] api_key_env` (default `GOOGLE_API_KEY`). It is never
//! stored in configuration files.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CloudConfig;
use crate::error::InsightError;

use super::{http_client, GenerationRequest, ModelBackend};

#[derive(Clone)]
pub struct CloudBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for CloudBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CloudBackend {
    /// Falls back to a client without a timeout if the configured one cannot
    /// be built; `from_config` reports that as a skip reason instead
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Self {
        let client = http_client(timeout).unwrap_or_else(|e| {
            warn!(error = %e, "Using an HTTP client without a request timeout");
            Client::new()
        });
        Self::with_client(client, base_url, model, api_key)
    }

    fn with_client(http_client: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from config, reading the key from the configured variable
    ///
    /// Returns the reason the backend cannot be used when the key is unset.
    pub fn from_config(config: &CloudConfig) -> Result<Self, String> {
        let key = std::env::var(&config.api_key_env).ok();
        Self::from_config_with_key(config, key.as_deref())
    }

    pub fn from_config_with_key(config: &CloudConfig, key: Option<&str>) -> Result<Self, String> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(Self::with_client(
                http_client(config.timeout)?,
                &config.base_url,
                &config.model,
                key,
            )),
            None => Err(format!(
                "cloud API key not set (export {})",
                config.api_key_env
            )),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelBackend for CloudBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InsightError> {
        let params = &request.params;
        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.user.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: params.max_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                stop_sequences: params.stop.clone(),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, "Sending cloud generation request");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::GenerationFailed(format!("cloud request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::GenerationFailed(format!(
                "cloud API error {}: {}",
                status, body
            )));
        }

        let reply: GenerateContentResponse = response.json().await.map_err(|e| {
            InsightError::GenerationFailed(format!("invalid cloud API response: {}", e))
        })?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = reply
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("response blocked ({})", r))
                .unwrap_or_else(|| "empty response from cloud API".to_string());
            return Err(InsightError::GenerationFailed(reason));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "cloud"
    }

    fn describe(&self) -> String {
        format!("{} via {}", self.model, self.base_url)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// The hosted API has no repetition penalty; it is left out
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParams;
    use crate::test_utils::{MockModelServer, MockReply, MOCK_API_KEY, MOCK_REPLY};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "You are a Risk Auditor.".to_string(),
            user: "DATA:\nVerify is risky.".to_string(),
            params: GenerationParams::default(),
        }
    }

    fn backend(url: &str, key: &str) -> CloudBackend {
        CloudBackend::new(url, "gemini-2.5-flash", key, Duration::from_secs(5))
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = CloudConfig::default();
        let err = CloudBackend::from_config_with_key(&config, None).unwrap_err();
        assert!(err.contains("GOOGLE_API_KEY"));
        assert!(CloudBackend::from_config_with_key(&config, Some("  ")).is_err());
        assert!(CloudBackend::from_config_with_key(&config, Some("abc")).is_ok());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let backend = backend("http://127.0.0.1:9", "secret-key-123");
        let shown = format!("{:?}", backend);
        assert!(shown.contains("gemini-2.5-flash"));
        assert!(!shown.contains("secret-key-123"));
    }

    #[tokio::test]
    async fn test_configured_timeout_is_applied() {
        // Accepts connections into the backlog but never answers
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = CloudConfig {
            base_url: format!("http://{}", silent.local_addr().unwrap()),
            timeout: Duration::from_secs(1),
            ..CloudConfig::default()
        };
        let backend = CloudBackend::from_config_with_key(&config, Some(MOCK_API_KEY)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(20), backend.generate(&request()))
            .await
            .expect("request should time out on its own");
        assert!(matches!(result, Err(InsightError::GenerationFailed(_))));
    }

    #[tokio::test]
    async fn test_generate_content() {
        let server = MockModelServer::start().await;
        let text = backend(&server.url(), MOCK_API_KEY)
            .generate(&request())
            .await
            .unwrap();
        assert_eq!(text, MOCK_REPLY);

        let sent = server.requests();
        assert_eq!(sent.len(), 1);
        let body = &sent[0];
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a Risk Auditor."
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 600);
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["stopSequences"][0], "<end_of_turn>");
        assert!(body["generationConfig"].get("repeatPenalty").is_none());
    }

    #[tokio::test]
    async fn test_rejected_key_is_generation_failure() {
        let server = MockModelServer::start().await;
        let err = backend(&server.url(), "wrong")
            .generate(&request())
            .await
            .unwrap_err();
        match err {
            InsightError::GenerationFailed(msg) => assert!(msg.contains("403"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_generation_failure() {
        let server = MockModelServer::start_with(MockReply::Status(500)).await;
        let err = backend(&server.url(), MOCK_API_KEY)
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let server = MockModelServer::start_with(MockReply::Text(String::new())).await;
        let err = backend(&server.url(), MOCK_API_KEY)
            .generate(&request())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InsightError::GenerationFailed("empty response from cloud API".to_string())
        );
    }
}
