//! caselens configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An override file: `--config`, then `CASELENS_CONFIG`, then
//!    `~/.local/share/caselens/config.toml`
//! 2. Embedded defaults (compiled into binary)
//!
//! Keys missing from the override keep their default values. Credentials are
//! never read from the file, only the name of the environment variable that
//! holds them.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/caselens.toml");

/// Environment variable pointing at an override config file
pub const CONFIG_ENV: &str = "CASELENS_CONFIG";

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub data: DataConfig,
    pub reports: ReportSettings,
    pub insight: InsightConfig,
}

/// Where the source files live
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub cases_file: PathBuf,
    pub accounts_file: PathBuf,
    pub search_dirs: Vec<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cases_file: PathBuf::from("support_cases_anonymized.json"),
            accounts_file: PathBuf::from("accounts_anonymized.json"),
            search_dirs: Vec::new(),
        }
    }
}

/// Business context baked into report instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// Country where the company is headquartered; expected to dominate volume
    pub home_market: String,
    pub company: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            home_market: "Canada".to_string(),
            company: "Global Vision".to_string(),
        }
    }
}

/// Backend variants that can be tried at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Cloud,
    Local,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud" | "gemini" => Ok(Self::Cloud),
            "local" | "llamacpp" | "llama.cpp" => Ok(Self::Local),
            "mock" => Ok(Self::Mock),
            other => Err(format!(
                "Unknown backend '{}'. Available: cloud, local, mock",
                other
            )),
        }
    }
}

/// Sampling parameters applied to every generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    /// Markers that end generation
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 600,
            temperature: 0.4,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.15,
            stop: vec!["<end_of_turn>".to_string()],
        }
    }
}

/// Hosted model API
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Local quantized model served by a llama.cpp server process
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConfig {
    pub weights_file: PathBuf,
    pub model_dirs: Vec<PathBuf>,
    pub server_binary: PathBuf,
    /// Layers offloaded to the GPU (0 = CPU only)
    pub gpu_layers: u32,
    pub threads: Option<u32>,
    pub context_size: u32,
    pub startup_timeout: Duration,
    pub timeout: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            weights_file: PathBuf::from("gemma-3-4b-it-Q4_K_M.gguf"),
            model_dirs: Vec::new(),
            server_binary: PathBuf::from("llama-server"),
            gpu_layers: 0,
            threads: None,
            context_size: 4096,
            startup_timeout: Duration::from_secs(120),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Insight engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    /// Startup order of the backend fallback chain
    pub backends: Vec<BackendKind>,
    pub generation: GenerationParams,
    pub cloud: CloudConfig,
    pub local: LocalConfig,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::Cloud, BackendKind::Local],
            generation: GenerationParams::default(),
            cloud: CloudConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration (override first, then embedded default)
    ///
    /// An explicitly requested file must exist; the implicit locations are
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }
        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        parse_config(DEFAULT_CONFIG)
    }

    /// Parse a config file on top of the embedded defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = parse_config(DEFAULT_CONFIG)?;
        apply(&mut config, &content)?;
        Ok(config)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("caselens").join("config.toml"))
}

/// Parse config from TOML content on top of the built-in defaults
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply(&mut config, content)?;
    Ok(config)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    data: Option<RawData>,
    reports: Option<RawReports>,
    insight: Option<RawInsight>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    cases_file: Option<PathBuf>,
    accounts_file: Option<PathBuf>,
    search_dirs: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize)]
struct RawReports {
    home_market: Option<String>,
    company: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    backends: Option<Vec<String>>,
    generation: Option<RawGeneration>,
    cloud: Option<RawCloud>,
    local: Option<RawLocal>,
}

#[derive(Debug, Deserialize)]
struct RawGeneration {
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    repeat_penalty: Option<f32>,
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawCloud {
    model: Option<String>,
    base_url: Option<String>,
    api_key_env: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLocal {
    weights_file: Option<PathBuf>,
    model_dirs: Option<Vec<PathBuf>>,
    server_binary: Option<PathBuf>,
    gpu_layers: Option<u32>,
    threads: Option<u32>,
    context_size: Option<u32>,
    startup_timeout_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

fn apply(config: &mut Config, content: &str) -> Result<(), ConfigError> {
    let raw: RawConfig = toml::from_str(content)?;

    if let Some(data) = raw.data {
        if let Some(v) = data.cases_file {
            config.data.cases_file = v;
        }
        if let Some(v) = data.accounts_file {
            config.data.accounts_file = v;
        }
        if let Some(v) = data.search_dirs {
            config.data.search_dirs = v;
        }
    }

    if let Some(reports) = raw.reports {
        if let Some(v) = reports.home_market {
            config.reports.home_market = v;
        }
        if let Some(v) = reports.company {
            config.reports.company = v;
        }
    }

    let Some(insight) = raw.insight else {
        return Ok(());
    };

    if let Some(names) = insight.backends {
        config.insight.backends = names
            .iter()
            .map(|n| n.parse::<BackendKind>())
            .collect::<Result<_, _>>()
            .map_err(ConfigError::Invalid)?;
    }

    if let Some(g) = insight.generation {
        let params = &mut config.insight.generation;
        if let Some(v) = g.max_tokens {
            params.max_tokens = v;
        }
        if let Some(v) = g.temperature {
            params.temperature = v;
        }
        if let Some(v) = g.top_p {
            params.top_p = v;
        }
        if let Some(v) = g.top_k {
            params.top_k = v;
        }
        if let Some(v) = g.repeat_penalty {
            params.repeat_penalty = v;
        }
        if let Some(v) = g.stop {
            params.stop = v;
        }
        if params.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if !(0.0..=1.0).contains(&params.top_p) {
            return Err(ConfigError::Invalid("top_p must be within 0..=1".into()));
        }
    }

    if let Some(c) = insight.cloud {
        let cloud = &mut config.insight.cloud;
        if let Some(v) = c.model {
            cloud.model = v;
        }
        if let Some(v) = c.base_url {
            cloud.base_url = v;
        }
        if let Some(v) = c.api_key_env {
            cloud.api_key_env = v;
        }
        if let Some(v) = c.timeout_secs {
            cloud.timeout = Duration::from_secs(v);
        }
    }

    if let Some(l) = insight.local {
        let local = &mut config.insight.local;
        if let Some(v) = l.weights_file {
            local.weights_file = v;
        }
        if let Some(v) = l.model_dirs {
            local.model_dirs = v;
        }
        if let Some(v) = l.server_binary {
            local.server_binary = v;
        }
        if let Some(v) = l.gpu_layers {
            local.gpu_layers = v;
        }
        if l.threads.is_some() {
            local.threads = l.threads;
        }
        if let Some(v) = l.context_size {
            local.context_size = v;
        }
        if let Some(v) = l.startup_timeout_secs {
            local.startup_timeout = Duration::from_secs(v);
        }
        if let Some(v) = l.timeout_secs {
            local.timeout = Duration::from_secs(v);
        }
    }

    Ok(())
}
