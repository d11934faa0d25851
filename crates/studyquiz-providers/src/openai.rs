//! OpenAI API provider implementation.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible API provider.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, base_url: Option<String>, org_id: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(api_key, base_url, org_id, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            timeout_secs,
            client,
        })
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    File { file: FileData },
}

#[derive(Serialize)]
struct FileData {
    filename: String,
    file_data: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
    model: String,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

fn api_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiError>(body)
        .ok()
        .map(|e| e.error.message)
}

/// PDFs go up as a data-URL file part, text documents inline.
fn document_part(doc: &DocumentAttachment) -> Result<ContentPart, ProviderError> {
    if doc.media_type == PDF {
        Ok(ContentPart::File {
            file: FileData {
                filename: doc.name.clone(),
                file_data: format!("data:{PDF};base64,{}", STANDARD.encode(&doc.data)),
            },
        })
    } else if doc.is_text() {
        Ok(ContentPart::Text {
            text: format!("Document `{}`:\n\n{}", doc.name, doc.text_lossy()),
        })
    } else {
        Err(ProviderError::UnsupportedDocument {
            provider: "openai".into(),
            media_type: doc.media_type.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %request.model, documents = request.documents.len()))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let mut parts = request
            .documents
            .iter()
            .map(document_part)
            .collect::<Result<Vec<_>, _>>()?;
        parts.push(ContentPart::Text {
            text: request.prompt.clone(),
        });

        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let body = OpenAiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: MessageContent::Text(system_prompt),
                },
                OpenAiMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = check_status(response, &request.model, api_message).await?;
        let api_response: OpenAiResponse = response.json().await.map_err(decode_error)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(GenerateResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.prompt_tokens,
                completion_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o".into(),
                name: "GPT-4o".into(),
                provider: "openai".into(),
                max_context: 128_000,
                accepts_pdf: true,
            },
            ModelInfo {
                id: "gpt-4o-mini".into(),
                name: "GPT-4o Mini".into(),
                provider: "openai".into(),
                max_context: 128_000,
                accepts_pdf: true,
            },
        ]
    }
}
