//! Answer grading.
//!
//! Scores are percentages rounded to one decimal place. Rounding is done on
//! the exact ratio with round-half-to-even, so `100 * k / n` never picks up
//! floating-point drift before it is rounded.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::QuizError;
use crate::model::{Quiz, QuizId, QuizState};

/// Outcome of submitting a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedQuiz {
    pub quiz_id: QuizId,
    /// Percentage score with one decimal.
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    /// `false` when the quiz was already completed and the stored grade was
    /// returned unchanged.
    pub newly_graded: bool,
}

/// Percentage of `correct` out of `total`, rounded to one decimal place with
/// round-half-to-even on the exact ratio.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let numerator = 1000 * correct as u64;
    let denominator = total as u64;
    let mut tenths = numerator / denominator;
    let remainder = numerator % denominator;
    if 2 * remainder > denominator || (2 * remainder == denominator && tenths % 2 == 1) {
        tenths += 1;
    }
    tenths as f64 / 10.0
}

/// Grades submitted quizzes.
pub struct AnswerGrader;

impl AnswerGrader {
    /// Grade an in-progress quiz and complete it.
    ///
    /// Resubmitting a completed quiz returns its stored score without
    /// recomputing anything.
    pub fn submit(quiz: &mut Quiz) -> Result<GradedQuiz, QuizError> {
        let total = quiz.questions().len();
        let correct = quiz.questions().iter().filter(|q| q.is_correct()).count();

        if let (QuizState::Completed, Some(score)) = (quiz.state(), quiz.score()) {
            return Ok(GradedQuiz {
                quiz_id: quiz.id,
                score,
                correct,
                total,
                newly_graded: false,
            });
        }

        if quiz.state() != QuizState::InProgress {
            return Err(QuizError::InvalidTransition {
                from: quiz.state(),
                to: QuizState::Completed,
            });
        }

        let missing = quiz.unanswered();
        if !missing.is_empty() {
            return Err(QuizError::IncompleteSubmission { missing });
        }

        let score = percentage(correct, total);
        quiz.complete(score)?;
        info!(quiz = %quiz.id, correct, total, score, "quiz graded");

        Ok(GradedQuiz {
            quiz_id: quiz.id,
            score,
            correct,
            total,
            newly_graded: true,
        })
    }
}
