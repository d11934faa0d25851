//! Quiz state machine.
//!
//! `Draft → Assigned → InProgress → Completed`. No transition skips a state
//! and `Completed` is terminal. Completion is reserved for the grader.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::QuizError;
use crate::model::{OptionLabel, Quiz, QuizState};

const TRANSITIONS: &[(QuizState, QuizState)] = &[
    (QuizState::Draft, QuizState::Assigned),
    (QuizState::Assigned, QuizState::InProgress),
    (QuizState::InProgress, QuizState::Completed),
];

impl QuizState {
    /// Whether the transition table allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: QuizState) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    pub fn is_terminal(self) -> bool {
        !TRANSITIONS.iter().any(|(from, _)| *from == self)
    }
}

impl Quiz {
    fn transition(&mut self, to: QuizState) -> Result<(), QuizError> {
        if !self.state.can_transition_to(to) {
            return Err(QuizError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(quiz = %self.id, from = %self.state, %to, "quiz transition");
        self.state = to;
        Ok(())
    }

    /// `Draft → Assigned`, done when the draft is persisted for a course.
    pub fn assign(&mut self) -> Result<(), QuizError> {
        self.transition(QuizState::Assigned)
    }

    /// `Assigned → InProgress`, done when the student opens the quiz.
    /// Opening a quiz that is already in progress is a no-op.
    pub fn open(&mut self) -> Result<(), QuizError> {
        if self.state == QuizState::InProgress {
            return Ok(());
        }
        self.transition(QuizState::InProgress)
    }

    /// Record the chosen option for one question. The first answer of an
    /// assigned quiz moves it to `InProgress`; answers of a completed quiz
    /// are frozen.
    pub fn record_answer(&mut self, question_id: u32, label: OptionLabel) -> Result<(), QuizError> {
        let mut answers = BTreeMap::new();
        answers.insert(question_id, label);
        self.record_answers(&answers)
    }

    /// Record several answers at once. Every answer is checked before any is
    /// written, so a rejected batch leaves the quiz untouched.
    pub fn record_answers(&mut self, answers: &BTreeMap<u32, OptionLabel>) -> Result<(), QuizError> {
        match self.state {
            QuizState::Assigned | QuizState::InProgress => {}
            from => {
                return Err(QuizError::InvalidTransition {
                    from,
                    to: QuizState::InProgress,
                })
            }
        }

        for (&question_id, &label) in answers {
            let question = self
                .question(question_id)
                .ok_or(QuizError::UnknownQuestion(question_id))?;
            if !question.has_option(label) {
                return Err(QuizError::UnknownOption {
                    question: question_id,
                    label,
                });
            }
        }

        if !answers.is_empty() {
            self.open()?;
        }
        for question in &mut self.questions {
            if let Some(&label) = answers.get(&question.id) {
                question.user_label = Some(label);
            }
        }
        Ok(())
    }

    /// `InProgress → Completed` with the computed score. Only the grader
    /// calls this.
    pub(crate) fn complete(&mut self, score: f64) -> Result<(), QuizError> {
        self.transition(QuizState::Completed)?;
        self.score = Some(score);
        Ok(())
    }
}
