//! Local model backend
//!
//! Quantized GGUF weights are served by a llama.cpp server process
//! (`llama-server`) launched once at startup and held for the life of the
//! backend. Requests go to its OpenAI-compatible `/v1/chat/completions`
//! endpoint, which also accepts llama.cpp's own sampling fields
//! (`top_k`, `repeat_penalty`).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::LocalConfig;
use crate::error::InsightError;

use super::{http_client, GenerationRequest, ModelBackend};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Candidate directories for model weights, in search order
pub fn weight_dirs(config: &LocalConfig) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = config.model_dirs.clone();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("models"));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join("models"));
        candidates.push(exe_dir.join("..").join("models"));
    }
    if let Some(data) = dirs::data_local_dir() {
        candidates.push(data.join("caselens").join("models"));
    }
    candidates.dedup();
    candidates
}

/// Find the weights file; on failure returns every path that was tried
pub fn resolve_weights(config: &LocalConfig) -> Result<PathBuf, Vec<PathBuf>> {
    let file = &config.weights_file;
    if file.is_absolute() {
        return if file.is_file() {
            Ok(file.clone())
        } else {
            Err(vec![file.clone()])
        };
    }
    let candidates: Vec<PathBuf> = weight_dirs(config).iter().map(|d| d.join(file)).collect();
    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(candidates),
    }
}

/// Running llama.cpp server; killed when the last backend clone drops
struct Runtime {
    _child: Mutex<Child>,
    weights: PathBuf,
}

#[derive(Clone)]
pub struct LocalBackend {
    http_client: Client,
    base_url: String,
    model: String,
    runtime: Option<Arc<Runtime>>,
}

impl LocalBackend {
    /// Use an already running llama.cpp-compatible server
    pub fn attach(base_url: &str, model: &str, timeout: Duration) -> Self {
        let client = http_client(timeout).unwrap_or_else(|e| {
            warn!(error = %e, "Using an HTTP client without a request timeout");
            Client::new()
        });
        Self {
            http_client: client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            runtime: None,
        }
    }

    /// Resolve the weights and launch a server process for them
    ///
    /// Returns the reason the backend cannot be used on failure.
    pub async fn launch(config: &LocalConfig) -> Result<Self, String> {
        let weights = resolve_weights(config).map_err(|searched| {
            format!(
                "model weights '{}' not found (searched: {})",
                config.weights_file.display(),
                searched
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        let port = free_port().map_err(|e| format!("no free local port: {}", e))?;
        let health_client = http_client(HEALTH_POLL_INTERVAL * 4)?;
        let client = http_client(config.timeout)?;

        let mut command = Command::new(&config.server_binary);
        command
            .arg("-m")
            .arg(&weights)
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .args(["-ngl", &config.gpu_layers.to_string()])
            .args(["-c", &config.context_size.to_string()]);
        if let Some(threads) = config.threads {
            command.args(["-t", &threads.to_string()]);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        info!(
            weights = %weights.display(),
            gpu_layers = config.gpu_layers,
            "Starting local model server"
        );
        let mut child = command.spawn().map_err(|e| {
            format!(
                "could not start '{}': {}",
                config.server_binary.display(),
                e
            )
        })?;

        let base_url = format!("http://127.0.0.1:{}", port);
        let deadline = Instant::now() + config.startup_timeout;
        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(format!("local model server exited during startup ({})", status));
            }
            if is_healthy(&health_client, &base_url).await {
                break;
            }
            if Instant::now() >= deadline {
                return Err(format!(
                    "local model server not ready after {}s",
                    config.startup_timeout.as_secs()
                ));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }

        let model = weights
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());
        Ok(Self {
            http_client: client,
            base_url,
            model,
            runtime: Some(Arc::new(Runtime {
                _child: Mutex::new(child),
                weights,
            })),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Weights path when this backend owns the server process
    pub fn weights(&self) -> Option<&Path> {
        self.runtime.as_ref().map(|r| r.weights.as_path())
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InsightError> {
        let params = &request.params;
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            repeat_penalty: params.repeat_penalty,
            stop: params.stop.clone(),
            stream: false,
        };
        debug!(model = %self.model, "Sending local generation request");

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::GenerationFailed(format!("local model request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::GenerationFailed(format!(
                "local model error {}: {}",
                status, body
            )));
        }

        let chat: ChatCompletionResponse = response.json().await.map_err(|e| {
            InsightError::GenerationFailed(format!("invalid local model response: {}", e))
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                InsightError::GenerationFailed("empty response from local model".to_string())
            })
    }

    fn name(&self) -> &'static str {
        "local"
    }

    fn describe(&self) -> String {
        match self.weights() {
            Some(path) => format!("{} ({}) at {}", self.model, path.display(), self.base_url),
            None => format!("{} at {}", self.model, self.base_url),
        }
    }
}

fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

async fn is_healthy(client: &Client, base_url: &str) -> bool {
    match client.get(format!("{}/health", base_url)).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// OpenAI chat completion request with llama.cpp sampling extensions
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParams;
    use crate::test_utils::{MockModelServer, MockReply, MOCK_REPLY};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "You are a Staffing Planner.".to_string(),
            user: "DATA:\nNet change: +25.0%.".to_string(),
            params: GenerationParams::default(),
        }
    }

    #[test]
    fn test_resolve_weights_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            weights_file: PathBuf::from("tiny.gguf"),
            model_dirs: vec![dir.path().to_path_buf()],
            ..LocalConfig::default()
        };
        let searched = resolve_weights(&config).unwrap_err();
        assert_eq!(searched[0], dir.path().join("tiny.gguf"));

        std::fs::write(dir.path().join("tiny.gguf"), b"GGUF").unwrap();
        assert_eq!(resolve_weights(&config).unwrap(), dir.path().join("tiny.gguf"));
    }

    #[test]
    fn test_resolve_absolute_weights_only_checks_path() {
        let config = LocalConfig {
            weights_file: PathBuf::from("/nonexistent/model.gguf"),
            ..LocalConfig::default()
        };
        assert_eq!(
            resolve_weights(&config).unwrap_err(),
            vec![PathBuf::from("/nonexistent/model.gguf")]
        );
    }

    #[test]
    fn test_weight_dirs_order() {
        let config = LocalConfig {
            model_dirs: vec![PathBuf::from("/opt/models")],
            ..LocalConfig::default()
        };
        let dirs = weight_dirs(&config);
        assert_eq!(dirs[0], PathBuf::from("/opt/models"));
        assert_eq!(
            dirs[1],
            std::env::current_dir().unwrap().join("models")
        );
    }

    #[tokio::test]
    async fn test_launch_without_weights_reports_reason() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            weights_file: PathBuf::from("missing.gguf"),
            model_dirs: vec![dir.path().to_path_buf()],
            ..LocalConfig::default()
        };
        let reason = LocalBackend::launch(&config).await.err().unwrap();
        assert!(reason.contains("model weights 'missing.gguf' not found"), "{}", reason);
    }

    #[tokio::test]
    async fn test_launch_with_missing_server_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), b"GGUF").unwrap();
        let config = LocalConfig {
            weights_file: PathBuf::from("tiny.gguf"),
            model_dirs: vec![dir.path().to_path_buf()],
            server_binary: PathBuf::from("/nonexistent/llama-server"),
            ..LocalConfig::default()
        };
        let reason = LocalBackend::launch(&config).await.err().unwrap();
        assert!(reason.contains("could not start"), "{}", reason);
    }

    #[tokio::test]
    async fn test_chat_completion_request() {
        let server = MockModelServer::start().await;
        let backend = LocalBackend::attach(&server.url(), "gemma", Duration::from_secs(5));
        let text = backend.generate(&request()).await.unwrap();
        assert_eq!(text, MOCK_REPLY);

        let sent = server.requests();
        let body = &sent[0];
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "DATA:\nNet change: +25.0%.");
        assert_eq!(body["max_tokens"], 600);
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["stop"][0], "<end_of_turn>");
        assert!(body["repeat_penalty"].as_f64().unwrap() > 1.0);
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockModelServer::start_with(MockReply::Status(503)).await;
        let backend = LocalBackend::attach(&server.url(), "gemma", Duration::from_secs(5));
        let err = backend.generate(&request()).await.unwrap_err();
        match err {
            InsightError::GenerationFailed(msg) => assert!(msg.contains("503"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let port = free_port().unwrap();
        let backend = LocalBackend::attach(
            &format!("http://127.0.0.1:{}", port),
            "gemma",
            Duration::from_secs(2),
        );
        assert!(matches!(
            backend.generate(&request()).await,
            Err(InsightError::GenerationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_request_timeout_is_applied() {
        // Never accepts, so the request sits in the backlog until it times out
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let backend = LocalBackend::attach(
            &format!("http://{}", silent.local_addr().unwrap()),
            "gemma",
            Duration::from_secs(1),
        );
        let result = tokio::time::timeout(Duration::from_secs(20), backend.generate(&request()))
            .await
            .expect("request should time out on its own");
        assert!(matches!(result, Err(InsightError::GenerationFailed(_))));
    }
}
