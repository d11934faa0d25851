//! The generative-AI provider trait.
//!
//! Implemented by the `studyquiz-providers` crate.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ingest::RawDocument;

// ---------------------------------------------------------------------------
// LLM Provider trait
// ---------------------------------------------------------------------------

/// Trait for LLM backends that turn course material into quiz JSON.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Send the prompt and attached documents, return the model's text.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request to an LLM.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "claude-3-5-sonnet-latest").
    pub model: String,
    /// The instruction text.
    pub prompt: String,
    /// Optional system prompt override.
    pub system_prompt: Option<String>,
    /// Documents sent alongside the prompt.
    pub documents: Vec<DocumentAttachment>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// A document attached to a request.
#[derive(Clone, PartialEq)]
pub struct DocumentAttachment {
    pub name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl DocumentAttachment {
    pub fn is_text(&self) -> bool {
        self.media_type.starts_with("text/")
    }

    /// The document as text, for backends that only take text.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl fmt::Debug for DocumentAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentAttachment")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

impl From<&RawDocument> for DocumentAttachment {
    fn from(doc: &RawDocument) -> Self {
        Self {
            name: doc.name.clone(),
            media_type: doc.media_type.clone(),
            data: doc.bytes.clone(),
        }
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw response text.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Whether PDF documents can be attached directly.
    pub accepts_pdf: bool,
}

// ---------------------------------------------------------------------------
// Default system prompt
// ---------------------------------------------------------------------------

/// Default system prompt for quiz generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an educator who writes multiple-choice practice quizzes from course material. Respond ONLY with a single JSON object. Do not include explanations or markdown formatting.";

// ---------------------------------------------------------------------------
// JSON payload extraction
// ---------------------------------------------------------------------------

/// Extract the JSON payload from an LLM response.
///
/// Handles:
/// - ```json fenced blocks (the first one wins)
/// - Generic ``` blocks (if no json-specific block is found)
/// - Bare text, trimmed to the outermost `{ ... }` when present
pub fn extract_json_payload(response: &str) -> String {
    let mut json_block: Option<String> = None;
    let mut generic_block: Option<String> = None;
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block && json_block.is_none() {
                json_block = Some(current_block.clone());
            } else if is_generic_block && generic_block.is_none() {
                generic_block = Some(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    // Truncated (unclosed) block: keep what was accumulated
    if in_block && !current_block.is_empty() {
        if is_json_block && json_block.is_none() {
            json_block = Some(current_block);
        } else if is_generic_block && generic_block.is_none() {
            generic_block = Some(current_block);
        }
    }

    if let Some(block) = json_block.or(generic_block) {
        return block.trim().to_string();
    }

    let trimmed = response.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_block() {
        let input = "Here is your quiz:\n\n```json\n{\"quiz_name\": \"Cells\"}\n```\n\nGood luck!";
        assert_eq!(extract_json_payload(input), "{\"quiz_name\": \"Cells\"}");
    }

    #[test]
    fn extract_prefers_json_over_generic() {
        let input = "```\nnot this\n```\n\n```json\n{\"a\": 1}\n```\n";
        assert_eq!(extract_json_payload(input), "{\"a\": 1}");
    }

    #[test]
    fn extract_generic_block_fallback() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_payload(input), "{\"a\": 1}");
    }

    #[test]
    fn extract_bare_object_with_chatter() {
        let input = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(extract_json_payload(input), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn extract_truncated_block() {
        let input = "```json\n{\"a\": 1";
        assert_eq!(extract_json_payload(input), "{\"a\": 1");
    }

    #[test]
    fn extract_plain_text_returned_trimmed() {
        assert_eq!(extract_json_payload("  no json here  "), "no json here");
    }

    #[test]
    fn attachment_debug_hides_bytes() {
        let doc = DocumentAttachment {
            name: "notes.txt".into(),
            media_type: "text/plain".into(),
            data: b"secret lecture notes".to_vec(),
        };
        let debug = format!("{doc:?}");
        assert!(debug.contains("<20 bytes>"));
        assert!(!debug.contains("secret"));
        assert!(doc.is_text());
    }
}
