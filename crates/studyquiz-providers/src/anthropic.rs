//! Anthropic API provider implementation.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use studyquiz_core::ingest::PDF;
use studyquiz_core::traits::{
    DocumentAttachment, GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage,
    DEFAULT_SYSTEM_PROMPT,
};

use crate::error::{check_status, decode_error, send_error, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const API_VERSION: &str = "2023-06-01";

/// Anthropic API provider.
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, base_url: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(api_key: &str, base_url: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs,
            client,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text {
        text: String,
    },
    Document {
        source: DocumentSource,
        title: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DocumentSource {
    Base64 { media_type: String, data: String },
    Text { media_type: String, data: String },
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
    model: String,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

fn api_message(body: &str) -> Option<String> {
    serde_json::from_str::<AnthropicError>(body)
        .ok()
        .map(|e| e.error.message)
}

/// PDFs go up as base64, text documents as plain-text sources.
fn document_block(doc: &DocumentAttachment) -> Result<ContentBlock, ProviderError> {
    let source = if doc.media_type == PDF {
        DocumentSource::Base64 {
            media_type: PDF.to_string(),
            data: STANDARD.encode(&doc.data),
        }
    } else if doc.is_text() {
        DocumentSource::Text {
            media_type: "text/plain".to_string(),
            data: doc.text_lossy(),
        }
    } else {
        return Err(ProviderError::UnsupportedDocument {
            provider: "anthropic".into(),
            media_type: doc.media_type.clone(),
        });
    };
    Ok(ContentBlock::Document {
        source,
        title: doc.name.clone(),
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %request.model, documents = request.documents.len()))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let mut content = request
            .documents
            .iter()
            .map(document_block)
            .collect::<Result<Vec<_>, _>>()?;
        content.push(ContentBlock::Text {
            text: request.prompt.clone(),
        });

        let body = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = check_status(response, &request.model, api_message).await?;
        let api_response: AnthropicResponse = response.json().await.map_err(decode_error)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content = api_response
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = &api_response.usage;
        Ok(GenerateResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-3-5-sonnet-latest".into(),
                name: "Claude 3.5 Sonnet".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
                accepts_pdf: true,
            },
            ModelInfo {
                id: "claude-3-5-haiku-latest".into(),
                name: "Claude 3.5 Haiku".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
                accepts_pdf: true,
            },
        ]
    }
}
