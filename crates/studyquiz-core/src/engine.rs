//! Quiz lifecycle orchestrator.
//!
//! Ties ingestion, generation, the quiz store, the state machine, grading
//! and the coursework registry together. Every mutating call works on a
//! copy of the stored quiz and writes it back with the version it read, so
//! a failed call leaves nothing behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, QuizError};
use crate::generation::QuizGenerationService;
use crate::grader::{AnswerGrader, GradedQuiz};
use crate::ingest::{DocumentIngestor, RawDocument};
use crate::model::{
    CourseId, CourseworkId, CourseworkItem, OptionLabel, Quiz, QuizDraft, QuizId, QuizOption,
    QuizState,
};
use crate::registry::CourseworkRegistry;
use crate::store::{CourseworkStore, MemoryStore, QuizStore, Versioned};

/// Chosen option per question id.
pub type Submission = BTreeMap<u32, OptionLabel>;

/// One line of a course's quiz list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub state: QuizState,
    pub score: Option<f64>,
    pub question_count: usize,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            name: quiz.name.clone(),
            created_at: quiz.created_at,
            state: quiz.state(),
            score: quiz.score(),
            question_count: quiz.questions().len(),
        }
    }
}

/// How a quiz is presented: answerable, or read-only with the key shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    Take,
    Review,
}

/// A question as shown to the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQuestion {
    pub id: u32,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    pub chosen: Option<OptionLabel>,
    /// Hidden until the quiz is completed.
    pub correct: Option<OptionLabel>,
    pub is_correct: Option<bool>,
}

/// A quiz as shown to the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizReview {
    pub quiz_id: QuizId,
    pub name: String,
    pub state: QuizState,
    pub mode: ReviewMode,
    pub score: Option<f64>,
    pub questions: Vec<ReviewQuestion>,
}

impl From<&Quiz> for QuizReview {
    fn from(quiz: &Quiz) -> Self {
        let mode = if quiz.score().is_some() {
            ReviewMode::Review
        } else {
            ReviewMode::Take
        };
        let questions = quiz
            .questions()
            .iter()
            .map(|q| ReviewQuestion {
                id: q.id,
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                chosen: q.user_label(),
                correct: (mode == ReviewMode::Review).then_some(q.correct_label),
                is_correct: (mode == ReviewMode::Review).then(|| q.is_correct()),
            })
            .collect();

        Self {
            quiz_id: quiz.id,
            name: quiz.name.clone(),
            state: quiz.state(),
            mode,
            score: quiz.score(),
            questions,
        }
    }
}

/// The study workflow: from an uploaded document to a course grade.
pub struct StudyEngine {
    ingestor: DocumentIngestor,
    quizzes: Arc<dyn QuizStore>,
    registry: CourseworkRegistry,
}

impl StudyEngine {
    pub fn new(
        ingestor: DocumentIngestor,
        quizzes: Arc<dyn QuizStore>,
        coursework: Arc<dyn CourseworkStore>,
    ) -> Self {
        Self {
            ingestor,
            quizzes,
            registry: CourseworkRegistry::new(coursework),
        }
    }

    /// An engine whose quizzes and coursework share one `MemoryStore`.
    pub fn with_memory_store(ingestor: DocumentIngestor, store: Arc<MemoryStore>) -> Self {
        Self::new(ingestor, store.clone(), store)
    }

    pub fn registry(&self) -> &CourseworkRegistry {
        &self.registry
    }

    pub fn ingestor(&self) -> &DocumentIngestor {
        &self.ingestor
    }

    /// Ingest a document, generate a quiz from it and assign it to `course`.
    ///
    /// Nothing is stored unless every step succeeds; cancelling `cancel`
    /// aborts the provider call.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_quiz(
        &self,
        generator: &QuizGenerationService,
        course: &CourseId,
        document_name: &str,
        bytes: Vec<u8>,
        declared_type: &str,
        question_count: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Quiz, Error> {
        let doc = self.ingestor.ingest(document_name, bytes, declared_type)?;
        self.create_quiz_from_document(generator, course, &doc, question_count, cancel)
            .await
    }

    /// Generate a quiz from an already ingested document and assign it to
    /// `course`.
    pub async fn create_quiz_from_document(
        &self,
        generator: &QuizGenerationService,
        course: &CourseId,
        doc: &RawDocument,
        question_count: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Quiz, Error> {
        let draft = match cancel {
            Some(token) => generator.generate_with_cancel(doc, question_count, token).await?,
            None => generator.generate(doc, question_count).await?,
        };
        self.assign_draft(draft, course)
    }

    /// Persist a validated draft as an assigned quiz of `course`.
    pub fn assign_draft(&self, draft: QuizDraft, course: &CourseId) -> Result<Quiz, Error> {
        let mut quiz = Quiz::from_draft(draft, course.clone());
        quiz.assign()?;
        self.quizzes.put_quiz(&quiz, None)?;
        info!(quiz = %quiz.id, course = %course, questions = quiz.questions().len(), "quiz assigned");
        Ok(quiz)
    }

    pub fn quiz(&self, id: QuizId) -> Result<Quiz, Error> {
        Ok(self.load(id)?.value)
    }

    /// A course's quizzes, oldest first.
    pub fn quizzes(&self, course: &CourseId) -> Result<Vec<QuizSummary>, Error> {
        Ok(self
            .quizzes
            .quizzes_for_course(course)?
            .iter()
            .map(QuizSummary::from)
            .collect())
    }

    /// Open an assigned quiz for answering.
    pub fn open_quiz(&self, id: QuizId) -> Result<Quiz, Error> {
        self.update(id, |quiz| quiz.open())
    }

    /// Record one answer without submitting.
    pub fn answer(&self, id: QuizId, question_id: u32, label: OptionLabel) -> Result<Quiz, Error> {
        self.update(id, |quiz| quiz.record_answer(question_id, label))
    }

    /// Record `answers` and grade the quiz. An assigned quiz is opened by the
    /// first recorded answer and then submitted in the same call; the grader
    /// itself only accepts in-progress quizzes. A completed quiz returns its
    /// stored grade unchanged.
    pub fn submit(&self, id: QuizId, answers: &Submission) -> Result<GradedQuiz, Error> {
        let Versioned { value, version } = self.load(id)?;
        match value.state() {
            QuizState::Completed => return self.regrade_completed(&value),
            QuizState::Draft => {
                return Err(QuizError::InvalidTransition {
                    from: QuizState::Draft,
                    to: QuizState::Completed,
                }
                .into())
            }
            QuizState::Assigned | QuizState::InProgress => {}
        }

        let mut quiz = value;
        quiz.record_answers(answers)?;
        self.grade_and_store(quiz, version)
    }

    /// Grade a quiz from the answers already recorded on it.
    pub fn submit_recorded(&self, id: QuizId) -> Result<GradedQuiz, Error> {
        let Versioned { value, version } = self.load(id)?;
        if value.state() == QuizState::Completed {
            return self.regrade_completed(&value);
        }
        self.grade_and_store(value, version)
    }

    /// The quiz in take mode, or in review mode once it has a score.
    pub fn review(&self, id: QuizId) -> Result<QuizReview, Error> {
        Ok(QuizReview::from(&self.quiz(id)?))
    }

    /// Back a coursework item with a quiz of the same course.
    pub fn link_quiz(&self, item: CourseworkId, quiz: QuizId) -> Result<CourseworkItem, Error> {
        let quiz = self.quiz(quiz)?;
        Ok(self.registry.link_quiz(item, &quiz)?)
    }

    fn grade_and_store(&self, mut quiz: Quiz, version: u64) -> Result<GradedQuiz, Error> {
        let graded = AnswerGrader::submit(&mut quiz)?;
        self.quizzes.put_quiz(&quiz, Some(version))?;
        self.registry.apply_quiz_score(&quiz)?;
        Ok(graded)
    }

    /// A completed quiz keeps its grade. The coursework link is re-synced in
    /// case an earlier submit stored the quiz but failed before the item.
    fn regrade_completed(&self, quiz: &Quiz) -> Result<GradedQuiz, Error> {
        let mut quiz = quiz.clone();
        let graded = AnswerGrader::submit(&mut quiz)?;
        self.registry.apply_quiz_score(&quiz)?;
        Ok(graded)
    }

    fn load(&self, id: QuizId) -> Result<Versioned<Quiz>, Error> {
        self.quizzes
            .get_quiz(id)?
            .ok_or_else(|| QuizError::NotFound(id).into())
    }

    fn update<F>(&self, id: QuizId, f: F) -> Result<Quiz, Error>
    where
        F: FnOnce(&mut Quiz) -> Result<(), QuizError>,
    {
        let Versioned { mut value, version } = self.load(id)?;
        f(&mut value)?;
        self.quizzes.put_quiz(&value, Some(version))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CourseworkError, StoreError};
    use crate::model::DraftQuestion;

    fn label(c: char) -> OptionLabel {
        c.to_string().parse().unwrap()
    }

    fn draft(n: u32) -> QuizDraft {
        QuizDraft {
            name: "Photosynthesis".into(),
            questions: (1..=n)
                .map(|id| DraftQuestion {
                    id,
                    prompt: format!("q{id}"),
                    options: (0..4)
                        .map(|i| QuizOption {
                            label: OptionLabel::from_index(i).unwrap(),
                            text: format!("option {i}"),
                        })
                        .collect(),
                    correct_label: label('C'),
                })
                .collect(),
        }
    }

    fn engine() -> (StudyEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            StudyEngine::with_memory_store(DocumentIngestor::default(), store.clone()),
            store,
        )
    }

    fn answers(labels: &[char]) -> Submission {
        labels
            .iter()
            .enumerate()
            .map(|(i, &c)| (i as u32 + 1, label(c)))
            .collect()
    }

    #[test]
    fn assign_then_submit_grades_and_completes() {
        let (engine, _) = engine();
        let course = CourseId::new("bio");
        let quiz = engine.assign_draft(draft(4), &course).unwrap();
        assert_eq!(quiz.state(), QuizState::Assigned);

        let graded = engine
            .submit(quiz.id, &answers(&['C', 'C', 'A', 'C']))
            .unwrap();
        assert_eq!(graded.score, 75.0);
        assert!(graded.newly_graded);

        let stored = engine.quiz(quiz.id).unwrap();
        assert_eq!(stored.state(), QuizState::Completed);
        assert_eq!(stored.score(), Some(75.0));
    }

    #[test]
    fn resubmission_returns_stored_grade() {
        let (engine, store) = engine();
        let quiz = engine.assign_draft(draft(2), &CourseId::new("bio")).unwrap();
        engine.submit(quiz.id, &answers(&['C', 'A'])).unwrap();
        let version = store.get_quiz(quiz.id).unwrap().unwrap().version;

        let again = engine.submit(quiz.id, &answers(&['C', 'C'])).unwrap();
        assert_eq!(again.score, 50.0);
        assert!(!again.newly_graded);
        assert_eq!(store.get_quiz(quiz.id).unwrap().unwrap().version, version);
    }

    #[test]
    fn incomplete_submission_changes_nothing() {
        let (engine, store) = engine();
        let quiz = engine.assign_draft(draft(3), &CourseId::new("bio")).unwrap();

        let err = engine.submit(quiz.id, &answers(&['C'])).unwrap_err();
        match err {
            Error::Quiz(QuizError::IncompleteSubmission { missing }) => {
                assert_eq!(missing, vec![2, 3])
            }
            other => panic!("unexpected error: {other}"),
        }
        let stored = store.get_quiz(quiz.id).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value.state(), QuizState::Assigned);
        assert!(stored.value.questions()[0].user_label().is_none());
    }

    #[test]
    fn draft_quiz_cannot_be_submitted() {
        let (engine, store) = engine();
        let quiz = Quiz::from_draft(draft(1), CourseId::new("bio"));
        store.put_quiz(&quiz, None).unwrap();

        let err = engine.submit(quiz.id, &answers(&['C'])).unwrap_err();
        assert!(matches!(
            err,
            Error::Quiz(QuizError::InvalidTransition {
                from: QuizState::Draft,
                to: QuizState::Completed
            })
        ));
    }

    #[test]
    fn assigned_quiz_needs_answers_before_recorded_submit() {
        let (engine, _) = engine();
        let quiz = engine.assign_draft(draft(1), &CourseId::new("bio")).unwrap();
        let err = engine.submit_recorded(quiz.id).unwrap_err();
        assert!(matches!(
            err,
            Error::Quiz(QuizError::InvalidTransition {
                from: QuizState::Assigned,
                ..
            })
        ));
    }

    #[test]
    fn answer_one_by_one_then_submit_recorded() {
        let (engine, _) = engine();
        let quiz = engine.assign_draft(draft(2), &CourseId::new("bio")).unwrap();

        let opened = engine.answer(quiz.id, 1, label('C')).unwrap();
        assert_eq!(opened.state(), QuizState::InProgress);
        engine.answer(quiz.id, 2, label('B')).unwrap();

        let take = engine.review(quiz.id).unwrap();
        assert_eq!(take.mode, ReviewMode::Take);
        assert!(take.questions.iter().all(|q| q.correct.is_none()));

        let graded = engine.submit_recorded(quiz.id).unwrap();
        assert_eq!(graded.score, 50.0);

        let review = engine.review(quiz.id).unwrap();
        assert_eq!(review.mode, ReviewMode::Review);
        assert_eq!(review.questions[0].is_correct, Some(true));
        assert_eq!(review.questions[1].chosen, Some(label('B')));
        assert_eq!(review.questions[1].correct, Some(label('C')));
    }

    #[test]
    fn submitting_linked_quiz_grades_coursework() {
        let (engine, _) = engine();
        let course = CourseId::new("bio");
        let quiz = engine.assign_draft(draft(2), &course).unwrap();
        let item = engine.registry().add_item(&course, "Quiz 1", 0.2).unwrap();
        engine.registry().add_item(&course, "Final", 0.5).unwrap();
        engine.link_quiz(item.id, quiz.id).unwrap();

        engine.submit(quiz.id, &answers(&['C', 'C'])).unwrap();

        let linked = engine.registry().item(item.id).unwrap();
        assert_eq!(linked.grade, Some(100.0));
        let grade = engine.registry().course_grade(&course).unwrap();
        assert!((grade.final_grade - 20.0).abs() < 1e-9);
    }

    #[test]
    fn manual_edit_cannot_shadow_linked_quiz() {
        let (engine, _) = engine();
        let course = CourseId::new("bio");
        let quiz = engine.assign_draft(draft(2), &course).unwrap();
        let item = engine.registry().add_item(&course, "Quiz 1", 0.5).unwrap();
        engine.link_quiz(item.id, quiz.id).unwrap();

        let err = engine.registry().edit_grade(item.id, 95.0).unwrap_err();
        assert!(matches!(err, CourseworkError::LinkedToQuiz(_)));

        let graded = engine.submit(quiz.id, &answers(&['C', 'A'])).unwrap();
        assert_eq!(graded.score, 50.0);
        assert_eq!(engine.registry().item(item.id).unwrap().grade, Some(50.0));
        let grade = engine.registry().course_grade(&course).unwrap();
        assert!((grade.final_grade - 25.0).abs() < 1e-9);
    }

    #[test]
    fn link_rejects_quiz_of_other_course() {
        let (engine, _) = engine();
        let quiz = engine.assign_draft(draft(1), &CourseId::new("chem")).unwrap();
        let item = engine
            .registry()
            .add_item(&CourseId::new("bio"), "Quiz", 0.1)
            .unwrap();
        let err = engine.link_quiz(item.id, quiz.id).unwrap_err();
        assert!(matches!(
            err,
            Error::Coursework(CourseworkError::CourseMismatch { .. })
        ));
    }

    #[test]
    fn stale_writer_is_rejected() {
        let (engine, store) = engine();
        let quiz = engine.assign_draft(draft(1), &CourseId::new("bio")).unwrap();
        engine.open_quiz(quiz.id).unwrap();

        // A writer holding the original version loses.
        let err = store.put_quiz(&quiz, Some(1)).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, actual: 2 }));
    }

    #[test]
    fn listing_and_missing_quiz() {
        let (engine, _) = engine();
        let course = CourseId::new("bio");
        engine.assign_draft(draft(1), &course).unwrap();
        engine.assign_draft(draft(3), &course).unwrap();

        let list = engine.quizzes(&course).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].question_count, 3);
        assert!(list.iter().all(|q| q.state == QuizState::Assigned && q.score.is_none()));

        let err = engine.quiz(QuizId::new()).unwrap_err();
        assert!(matches!(err, Error::Quiz(QuizError::NotFound(_))));
    }
}
