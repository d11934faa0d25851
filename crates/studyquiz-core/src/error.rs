//! Error taxonomy for the quiz and grade engines.
//!
//! Each engine concern has its own error type so callers can tell
//! user-correctable failures (bad weights, missing answers) apart from usage
//! errors (invalid transitions) and backend failures. `ProviderError` lives
//! here so the generation service can downcast and classify provider
//! failures without string matching.

use thiserror::Error;

use crate::model::{CourseId, CourseworkId, OptionLabel, QuizId, QuizState};

/// Errors that can occur when interacting with an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend cannot accept this kind of attached document.
    #[error("provider '{provider}' does not accept {media_type} documents")]
    UnsupportedDocument {
        provider: String,
        media_type: String,
    },
}

impl ProviderError {
    /// Returns `true` if this error is permanent and re-issuing the request
    /// cannot help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_)
                | ProviderError::ModelNotFound(_)
                | ProviderError::UnsupportedDocument { .. }
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Document ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("document is {size} bytes, limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("document is empty")]
    Empty,

    /// The bytes do not carry the signature of the declared type.
    #[error("document content does not match declared type {0}")]
    ContentMismatch(String),
}

/// Quiz generation failures. None of these are retried automatically; the
/// caller may re-issue the whole request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question count must be between 1 and {max}, got {requested}")]
    InvalidQuestionCount { requested: usize, max: usize },

    #[error("malformed AI response: {0}")]
    MalformedResponse(String),

    /// `question` is the zero-based index of the offending question, or
    /// `None` when the violation concerns the quiz as a whole.
    #[error("{}", schema_violation_message(.question, .reason))]
    SchemaViolation {
        question: Option<usize>,
        reason: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Any other backend failure that is not a classified `ProviderError`.
    #[error("generation backend failed: {0}")]
    Backend(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("generation cancelled")]
    Cancelled,
}

fn schema_violation_message(question: &Option<usize>, reason: &str) -> String {
    match question {
        Some(index) => format!("schema violation in question at index {index}: {reason}"),
        None => format!("schema violation: {reason}"),
    }
}

impl GenerationError {
    pub(crate) fn schema(question: Option<usize>, reason: impl Into<String>) -> Self {
        GenerationError::SchemaViolation {
            question,
            reason: reason.into(),
        }
    }
}

/// Quiz lifecycle and grading failures.
#[derive(Debug, Error)]
pub enum QuizError {
    /// A state transition outside the table. Always a usage error.
    #[error("invalid quiz transition: {from} -> {to}")]
    InvalidTransition { from: QuizState, to: QuizState },

    #[error("incomplete submission, unanswered questions: {missing:?}")]
    IncompleteSubmission { missing: Vec<u32> },

    #[error("quiz has no question {0}")]
    UnknownQuestion(u32),

    #[error("question {question} has no option {label}")]
    UnknownOption { question: u32, label: OptionLabel },

    #[error("quiz not found: {0}")]
    NotFound(QuizId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coursework registry failures.
#[derive(Debug, Error)]
pub enum CourseworkError {
    #[error("weight must be in (0, 1], got {0}")]
    InvalidWeight(f64),

    #[error(
        "weight {requested} exceeds the course budget: current total {current_total}, headroom {headroom}"
    )]
    WeightExceeded {
        requested: f64,
        current_total: f64,
        headroom: f64,
    },

    #[error("grade must be in [0, 100], got {0}")]
    InvalidGrade(f64),

    #[error("coursework name must not be empty")]
    EmptyName,

    #[error("coursework item {0} already has a grade; edit it explicitly")]
    GradeAlreadySet(CourseworkId),

    #[error("coursework item {0} is graded by its linked quiz")]
    LinkedToQuiz(CourseworkId),

    #[error("coursework item {item} is already linked to quiz {quiz}")]
    ItemAlreadyLinked { item: CourseworkId, quiz: QuizId },

    #[error("quiz {0} already backs another coursework item")]
    QuizAlreadyLinked(QuizId),

    #[error("quiz {quiz} belongs to course {quiz_course}, not {course}")]
    CourseMismatch {
        quiz: QuizId,
        quiz_course: CourseId,
        course: CourseId,
    },

    #[error("coursework item not found: {0}")]
    ItemNotFound(CourseworkId),

    #[error("course {0} kept changing underneath the update; try again")]
    Conflict(CourseId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Storage collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("entity already exists: {0}")]
    AlreadyExists(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Top-level error for the lifecycle facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    Coursework(#[from] CourseworkError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_provider_errors() {
        assert!(ProviderError::AuthenticationFailed("nope".into()).is_permanent());
        assert!(ProviderError::ModelNotFound("m".into()).is_permanent());
        assert!(!ProviderError::Timeout(5).is_permanent());
        assert_eq!(
            ProviderError::RateLimited {
                retry_after_ms: 5000
            }
            .retry_after_ms(),
            Some(5000)
        );
    }

    #[test]
    fn schema_violation_names_the_question() {
        let err = GenerationError::schema(Some(2), "missing correct_answer");
        assert_eq!(
            err.to_string(),
            "schema violation in question at index 2: missing correct_answer"
        );
        let err = GenerationError::schema(None, "no questions");
        assert_eq!(err.to_string(), "schema violation: no questions");
    }

    #[test]
    fn invalid_transition_display() {
        let err = QuizError::InvalidTransition {
            from: QuizState::Draft,
            to: QuizState::Completed,
        };
        assert_eq!(err.to_string(), "invalid quiz transition: draft -> completed");
    }
}
