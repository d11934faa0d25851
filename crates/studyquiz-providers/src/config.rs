//! Configuration file and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use studyquiz_core::generation::GenerationConfig;
use studyquiz_core::ingest::{DocumentIngestor, DEFAULT_MAX_SIZE_BYTES, MARKDOWN, PDF, PLAIN_TEXT};
use studyquiz_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "studyquiz.toml";

/// Configuration for a single LLM provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Upper bound on one provider call, in seconds.
    pub timeout_secs: u64,
    pub options_per_question: usize,
    pub max_questions: usize,
    pub difficulty: String,
    pub system_prompt: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            options_per_question: 4,
            max_questions: 10,
            difficulty: "medium".into(),
            system_prompt: None,
        }
    }
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub max_size_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            allowed_types: vec![PDF.into(), PLAIN_TEXT.into(), MARKDOWN.into()],
        }
    }
}

/// Top-level studyquiz configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyquizConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Default provider to use.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default model to use.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Max tokens for a generated quiz.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f64,
    /// Where quizzes and coursework are persisted between runs.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_state_file() -> PathBuf {
    PathBuf::from("./studyquiz-state.json")
}

impl Default for StudyquizConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            state_file: default_state_file(),
            generation: GenerationSettings::default(),
            ingest: IngestSettings::default(),
        }
    }
}

impl StudyquizConfig {
    /// Generation settings for `model`, or the default model.
    pub fn generation_config(&self, model: Option<&str>) -> GenerationConfig {
        GenerationConfig {
            model: model.unwrap_or(&self.default_model).to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: Duration::from_secs(self.generation.timeout_secs),
            options_per_question: self.generation.options_per_question,
            max_questions: self.generation.max_questions,
            difficulty: self.generation.difficulty.clone(),
            system_prompt_override: self.generation.system_prompt.clone(),
        }
    }

    pub fn ingestor(&self) -> DocumentIngestor {
        DocumentIngestor::new(self.ingest.allowed_types.clone(), self.ingest.max_size_bytes)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `studyquiz.toml` in the current directory
/// 2. `~/.config/studyquiz/config.toml`
///
/// Environment variable overrides: `STUDYQUIZ_OPENAI_KEY`, `STUDYQUIZ_ANTHROPIC_KEY`.
pub fn load_config() -> Result<StudyquizConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<StudyquizConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<StudyquizConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => StudyquizConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("STUDYQUIZ_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("STUDYQUIZ_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    tracing::debug!(providers = config.providers.len(), "configuration loaded");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("studyquiz"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(config: &ProviderConfig, timeout_secs: u64) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config {
        ProviderConfig::Anthropic { api_key, base_url } => Arc::new(
            AnthropicProvider::with_timeout(api_key, base_url.clone(), timeout_secs)?,
        ),
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Arc::new(OpenAiProvider::with_timeout(
            api_key,
            base_url.clone(),
            org_id.clone(),
            timeout_secs,
        )?),
    };
    Ok(provider)
}

/// Split `provider/model` into its parts; a bare model uses `default_provider`.
pub fn parse_model_spec<'a>(spec: &'a str, default_provider: &'a str) -> (&'a str, &'a str) {
    match spec.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => (default_provider, spec),
    }
}
