//! Mock provider for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use studyquiz_core::traits::{
    GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage,
};

use crate::error::ProviderError;

/// A mock LLM provider for exercising quiz generation without real API calls.
///
/// Replies are taken from a queue first, then fall back to a fixed default.
pub struct MockProvider {
    /// Replies handed out in order, one per call.
    queued: Mutex<VecDeque<String>>,
    /// Reply once the queue is empty.
    default_response: String,
    /// Simulated latency.
    delay: Duration,
    /// Error returned on every call, if set.
    failure: Option<fn() -> ProviderError>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Create a mock that returns `responses` in order, then `{}`.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            queued: Mutex::new(responses.into()),
            default_response: "{}".to_string(),
            delay: Duration::ZERO,
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            ..Self::new(Vec::new())
        }
    }

    /// Create a mock whose every call fails with the error `make` builds.
    pub fn failing(make: fn() -> ProviderError) -> Self {
        Self {
            failure: Some(make),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this provider.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(make) = self.failure {
            return Err(make().into());
        }

        let content = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default_response.clone());

        // Rough estimate
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: self.delay.as_millis() as u64,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
            accepts_pdf: true,
        }]
    }
}
