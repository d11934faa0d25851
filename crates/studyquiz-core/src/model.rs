//! Core data model types for studyquiz.
//!
//! Quizzes, their questions, validated drafts, and the weighted coursework
//! items a course grade is rolled up from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub Uuid);

impl QuizId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuizId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifier of a coursework item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseworkId(pub Uuid);

impl CourseworkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CourseworkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CourseworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CourseworkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Reference to a course. Courses are owned by an external collaborator;
/// the engines only key data by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical option label: `A`, `B`, `C`, ... keyed by option position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OptionLabel(char);

impl OptionLabel {
    /// Largest number of options a question can carry.
    pub const MAX_OPTIONS: usize = 26;

    /// Label for the option at `index` (0 → `A`).
    pub fn from_index(index: usize) -> Option<Self> {
        if index < Self::MAX_OPTIONS {
            Some(Self((b'A' + index as u8) as char))
        } else {
            None
        }
    }

    /// Zero-based option position this label stands for.
    pub fn index(self) -> usize {
        (self.0 as u8 - b'A') as usize
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the label spellings models and users produce: `A`, `b`, `(c)`,
/// `d)`, `A.`, `B:`.
impl FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .unwrap_or(trimmed)
            .trim_end_matches([')', '.', ':'])
            .trim();

        let mut chars = inner.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(Self(c.to_ascii_uppercase())),
            _ => Err(format!("not an option label: '{s}'")),
        }
    }
}

impl TryFrom<String> for OptionLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionLabel> for String {
    fn from(label: OptionLabel) -> Self {
        label.0.to_string()
    }
}

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub label: OptionLabel,
    pub text: String,
}

/// Lifecycle state of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    Draft,
    Assigned,
    InProgress,
    Completed,
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizState::Draft => write!(f, "draft"),
            QuizState::Assigned => write!(f, "assigned"),
            QuizState::InProgress => write!(f, "in_progress"),
            QuizState::Completed => write!(f, "completed"),
        }
    }
}

/// A validated question that is not yet bound to a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftQuestion {
    /// 1-based position in the quiz.
    pub id: u32,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    pub correct_label: OptionLabel,
}

/// A generated quiz that passed schema validation but is not yet persisted
/// or owned by a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub name: String,
    pub questions: Vec<DraftQuestion>,
}

impl QuizDraft {
    pub fn state(&self) -> QuizState {
        QuizState::Draft
    }
}

/// A question of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub quiz_id: QuizId,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    pub correct_label: OptionLabel,
    /// Set only while the quiz is in progress or completed.
    #[serde(default)]
    pub(crate) user_label: Option<OptionLabel>,
}

impl Question {
    pub fn user_label(&self) -> Option<OptionLabel> {
        self.user_label
    }

    pub fn has_option(&self, label: OptionLabel) -> bool {
        self.options.iter().any(|o| o.label == label)
    }

    pub fn is_correct(&self) -> bool {
        self.user_label == Some(self.correct_label)
    }
}

/// A quiz owned by a course.
///
/// `state` and `score` only change through the state machine and the
/// grader, which keep `score` set exactly when the quiz is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub course_id: CourseId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub(crate) questions: Vec<Question>,
    pub(crate) state: QuizState,
    #[serde(default)]
    pub(crate) score: Option<f64>,
}

impl Quiz {
    /// Bind a draft to a course. The quiz stays in `Draft` until it is
    /// assigned.
    pub fn from_draft(draft: QuizDraft, course_id: CourseId) -> Self {
        let id = QuizId::new();
        let questions = draft
            .questions
            .into_iter()
            .map(|q| Question {
                id: q.id,
                quiz_id: id,
                prompt: q.prompt,
                options: q.options,
                correct_label: q.correct_label,
                user_label: None,
            })
            .collect();

        Self {
            id,
            course_id,
            name: draft.name,
            created_at: Utc::now(),
            questions,
            state: QuizState::Draft,
            score: None,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    /// Percentage score, present only once the quiz is completed.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Ids of questions without a chosen option.
    pub fn unanswered(&self) -> Vec<u32> {
        self.questions
            .iter()
            .filter(|q| q.user_label.is_none())
            .map(|q| q.id)
            .collect()
    }
}

/// A weighted, gradable component of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseworkItem {
    pub id: CourseworkId,
    pub course_id: CourseId,
    pub name: String,
    /// Fraction of the final grade, in (0, 1].
    pub weight: f64,
    /// Percentage grade, `None` until scored.
    #[serde(default)]
    pub grade: Option<f64>,
    /// Completed quiz backing this item's grade, if any.
    #[serde(default)]
    pub quiz_id: Option<QuizId>,
}

/// All coursework of one course together with the derived final grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseLedger {
    pub course_id: CourseId,
    #[serde(default)]
    pub items: Vec<CourseworkItem>,
    #[serde(default)]
    pub final_grade: f64,
}

impl CourseLedger {
    pub fn empty(course_id: CourseId) -> Self {
        Self {
            course_id,
            items: Vec::new(),
            final_grade: 0.0,
        }
    }
}
