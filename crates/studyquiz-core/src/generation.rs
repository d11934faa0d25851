//! Quiz generation.
//!
//! One request to the provider per quiz: the document is attached, the prompt
//! pins the question count, option count, difficulty and the JSON schema, and
//! the answer is parsed into a `QuizDraft`. The call is a single unit of work
//! bounded by a timeout and an optional cancellation token; nothing outlives
//! a failed or cancelled call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{GenerationError, ProviderError};
use crate::ingest::RawDocument;
use crate::model::QuizDraft;
use crate::parser::parse_quiz_draft;
use crate::traits::{extract_json_payload, DocumentAttachment, GenerateRequest, LlmProvider};

/// Configuration for quiz generation.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Max tokens for the response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on one provider call.
    pub timeout: Duration,
    /// Options requested per question.
    pub options_per_question: usize,
    /// Largest question count a caller may request.
    pub max_questions: usize,
    /// Difficulty wording used in the prompt (e.g. "medium").
    pub difficulty: String,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".into(),
            max_tokens: 4000,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            options_per_question: 4,
            max_questions: 10,
            difficulty: "medium".into(),
            system_prompt_override: None,
        }
    }
}

/// Build the instruction sent with the document. Same inputs, same text.
pub fn build_prompt(question_count: usize, options_per_question: usize, difficulty: &str) -> String {
    let option_slots = vec!["\"string\""; options_per_question].join(", ");
    let labels: Vec<String> = (0..options_per_question)
        .filter_map(crate::model::OptionLabel::from_index)
        .map(|l| l.to_string())
        .collect();

    format!(
        "Create a multiple-choice quiz from the attached document.\n\
         \n\
         Requirements:\n\
         - Write exactly {question_count} questions.\n\
         - Every question has exactly {options_per_question} distinct options.\n\
         - Difficulty: {difficulty}.\n\
         - Base every question on the document's content only.\n\
         - correct_answer is the label of the right option: one of {labels}.\n\
         \n\
         Respond with a single JSON object in exactly this format:\n\
         {{\n\
         \x20 \"quiz_name\": \"string\",\n\
         \x20 \"questions\": [\n\
         \x20   {{\n\
         \x20     \"id\": 1,\n\
         \x20     \"question\": \"string\",\n\
         \x20     \"options\": [{option_slots}],\n\
         \x20     \"correct_answer\": \"A\"\n\
         \x20   }}\n\
         \x20 ]\n\
         }}",
        labels = labels.join(", "),
    )
}

/// Sends documents to a provider and validates what comes back.
pub struct QuizGenerationService {
    provider: Arc<dyn LlmProvider>,
    config: GenerationConfig,
}

impl QuizGenerationService {
    pub fn new(provider: Arc<dyn LlmProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate a draft with exactly `question_count` questions.
    pub async fn generate(
        &self,
        doc: &RawDocument,
        question_count: usize,
    ) -> Result<QuizDraft, GenerationError> {
        self.generate_with_cancel(doc, question_count, &CancellationToken::new())
            .await
    }

    /// Like [`generate`](Self::generate), aborting as soon as `cancel` fires.
    #[instrument(skip(self, doc, cancel), fields(provider = %self.provider.name(), model = %self.config.model, document = %doc.name))]
    pub async fn generate_with_cancel(
        &self,
        doc: &RawDocument,
        question_count: usize,
        cancel: &CancellationToken,
    ) -> Result<QuizDraft, GenerationError> {
        if question_count == 0 || question_count > self.config.max_questions {
            return Err(GenerationError::InvalidQuestionCount {
                requested: question_count,
                max: self.config.max_questions,
            });
        }

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(
                question_count,
                self.config.options_per_question,
                &self.config.difficulty,
            ),
            system_prompt: self.config.system_prompt_override.clone(),
            documents: vec![DocumentAttachment::from(doc)],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let start = Instant::now();
        let call = tokio::time::timeout(self.config.timeout, self.provider.generate(&request));

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("generation cancelled by caller");
                return Err(GenerationError::Cancelled);
            }
            outcome = call => match outcome {
                Err(_) => {
                    warn!(timeout_secs = self.config.timeout.as_secs(), "generation timed out");
                    return Err(GenerationError::Timeout(self.config.timeout.as_secs()));
                }
                Ok(result) => result.map_err(classify_provider_failure)?,
            },
        };

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            completion_tokens = response.token_usage.completion_tokens,
            "provider responded"
        );

        let payload = extract_json_payload(&response.content);
        let draft = parse_quiz_draft(&payload, question_count).inspect_err(|e| {
            warn!(error = %e, "provider payload rejected");
        })?;

        info!(quiz = %draft.name, questions = draft.questions.len(), "quiz draft generated");
        Ok(draft)
    }
}

/// Recover a typed `ProviderError` from the provider's `anyhow` error.
fn classify_provider_failure(err: anyhow::Error) -> GenerationError {
    match err.downcast::<ProviderError>() {
        Ok(provider_err) => GenerationError::Provider(provider_err),
        Err(other) => GenerationError::Backend(format!("{other:#}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ingest::DocumentIngestor;
    use crate::traits::{GenerateResponse, ModelInfo, TokenUsage};

    enum Script {
        Reply(String),
        Fail(ProviderError),
        Opaque(&'static str),
        Hang,
    }

    struct ScriptedProvider {
        script: Mutex<Option<Script>>,
        seen: Mutex<Option<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(Some(script)),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            let script = self.script.lock().unwrap().take();
            match script {
                Some(Script::Reply(content)) => Ok(GenerateResponse {
                    content,
                    model: request.model.clone(),
                    token_usage: TokenUsage::default(),
                    latency_ms: 0,
                }),
                Some(Script::Fail(err)) => Err(err.into()),
                Some(Script::Opaque(msg)) => Err(anyhow::anyhow!(msg)),
                Some(Script::Hang) | None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn document() -> RawDocument {
        DocumentIngestor::default()
            .ingest("notes.pdf", b"%PDF-1.4 mitosis".to_vec(), "application/pdf")
            .unwrap()
    }

    fn quiz_json(n: usize) -> String {
        let questions: Vec<_> = (1..=n)
            .map(|i| {
                serde_json::json!({
                    "id": i,
                    "question": format!("Stage {i}?"),
                    "options": ["Prophase", "Metaphase", "Anaphase", "Telophase"],
                    "correct_answer": "A"
                })
            })
            .collect();
        serde_json::json!({ "quiz_name": "Mitosis", "questions": questions }).to_string()
    }

    #[test]
    fn prompt_is_deterministic_and_pins_counts() {
        let a = build_prompt(5, 4, "medium");
        let b = build_prompt(5, 4, "medium");
        assert_eq!(a, b);
        assert!(a.contains("exactly 5 questions"));
        assert!(a.contains("exactly 4 distinct options"));
        assert!(a.contains("Difficulty: medium"));
        assert!(a.contains("A, B, C, D"));
        assert!(a.contains("\"quiz_name\""));
        assert!(a.contains("\"correct_answer\""));
    }

    #[tokio::test]
    async fn generates_draft_from_fenced_reply() {
        let reply = format!("Here you go:\n```json\n{}\n```", quiz_json(3));
        let provider = ScriptedProvider::new(Script::Reply(reply));
        let service = QuizGenerationService::new(provider.clone(), GenerationConfig::default());

        let draft = service.generate(&document(), 3).await.unwrap();
        assert_eq!(draft.name, "Mitosis");
        assert_eq!(draft.questions.len(), 3);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "claude-3-5-sonnet-latest");
        assert_eq!(seen.max_tokens, 4000);
        assert_eq!(seen.documents.len(), 1);
        assert_eq!(seen.documents[0].media_type, "application/pdf");
        assert!(seen.prompt.contains("exactly 3 questions"));
    }

    #[tokio::test]
    async fn rejects_out_of_range_counts_without_calling_provider() {
        let provider = ScriptedProvider::new(Script::Reply(quiz_json(1)));
        let service = QuizGenerationService::new(provider.clone(), GenerationConfig::default());

        for n in [0, 11] {
            let err = service.generate(&document(), n).await.unwrap_err();
            assert!(matches!(
                err,
                GenerationError::InvalidQuestionCount { max: 10, .. }
            ));
        }
        assert!(provider.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn short_reply_is_a_schema_violation() {
        let provider = ScriptedProvider::new(Script::Reply(quiz_json(2)));
        let service = QuizGenerationService::new(provider, GenerationConfig::default());
        let err = service.generate(&document(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::SchemaViolation { question: None, .. }
        ));
    }

    #[tokio::test]
    async fn prose_reply_is_malformed() {
        let provider = ScriptedProvider::new(Script::Reply("I cannot read this file.".into()));
        let service = QuizGenerationService::new(provider, GenerationConfig::default());
        let err = service.generate(&document(), 1).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn provider_errors_keep_their_type() {
        let provider = ScriptedProvider::new(Script::Fail(ProviderError::AuthenticationFailed(
            "bad key".into(),
        )));
        let service = QuizGenerationService::new(provider, GenerationConfig::default());
        let err = service.generate(&document(), 1).await.unwrap_err();
        match err {
            GenerationError::Provider(p) => assert!(p.is_permanent()),
            other => panic!("unexpected error: {other}"),
        }

        let provider = ScriptedProvider::new(Script::Opaque("socket closed"));
        let service = QuizGenerationService::new(provider, GenerationConfig::default());
        let err = service.generate(&document(), 1).await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend(ref m) if m.contains("socket closed")));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_times_out() {
        let provider = ScriptedProvider::new(Script::Hang);
        let config = GenerationConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let service = QuizGenerationService::new(provider, config);
        let err = service.generate(&document(), 1).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(5)));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_call() {
        let provider = ScriptedProvider::new(Script::Hang);
        let service = QuizGenerationService::new(provider, GenerationConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = service
            .generate_with_cancel(&document(), 2, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
    }
}
