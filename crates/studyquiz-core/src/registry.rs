//! Coursework registry.
//!
//! The single enforcement point for the course weight budget: the weights of
//! a course's items never sum past 1. Every mutation loads the course ledger,
//! validates against it, recomputes the final grade and commits with the
//! version it read, so no reader ever sees a ledger over budget. A lost race
//! re-runs the whole validation against the fresh ledger.

use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregate::{total_weight, CourseGrade, WeightedGradeAggregator};
use crate::error::{CourseworkError, StoreError};
use crate::model::{CourseId, CourseworkId, CourseworkItem, Quiz, QuizState};
use crate::store::CourseworkStore;

/// Slack allowed when summing floating-point weights.
pub const WEIGHT_EPSILON: f64 = 1e-6;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

fn validate_weight(weight: f64) -> Result<(), CourseworkError> {
    if weight.is_finite() && weight > 0.0 && weight <= 1.0 {
        Ok(())
    } else {
        Err(CourseworkError::InvalidWeight(weight))
    }
}

fn validate_grade(grade: f64) -> Result<(), CourseworkError> {
    if grade.is_finite() && (0.0..=100.0).contains(&grade) {
        Ok(())
    } else {
        Err(CourseworkError::InvalidGrade(grade))
    }
}

fn validate_name(name: &str) -> Result<String, CourseworkError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(CourseworkError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Check that `requested` fits next to items already weighing `others`.
fn check_budget(others: f64, requested: f64) -> Result<(), CourseworkError> {
    if others + requested > 1.0 + WEIGHT_EPSILON {
        return Err(CourseworkError::WeightExceeded {
            requested,
            current_total: others,
            headroom: (1.0 - others).max(0.0),
        });
    }
    Ok(())
}

fn find_item(items: &mut [CourseworkItem], id: CourseworkId) -> Result<&mut CourseworkItem, CourseworkError> {
    items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or(CourseworkError::ItemNotFound(id))
}

/// Stores weighted coursework items per course.
pub struct CourseworkRegistry {
    store: Arc<dyn CourseworkStore>,
    max_attempts: u32,
}

impl CourseworkRegistry {
    pub fn new(store: Arc<dyn CourseworkStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// How many times a mutation re-validates after losing a race.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Items of a course in insertion order.
    pub fn items(&self, course: &CourseId) -> Result<Vec<CourseworkItem>, CourseworkError> {
        Ok(self.store.load_course(course)?.value.items)
    }

    pub fn item(&self, id: CourseworkId) -> Result<CourseworkItem, CourseworkError> {
        let course = self.course_of(id)?;
        self.items(&course)?
            .into_iter()
            .find(|i| i.id == id)
            .ok_or(CourseworkError::ItemNotFound(id))
    }

    /// Current grade figures for a course.
    pub fn course_grade(&self, course: &CourseId) -> Result<CourseGrade, CourseworkError> {
        let ledger = self.store.load_course(course)?.value;
        Ok(WeightedGradeAggregator::recompute(&ledger.items))
    }

    /// Sum of the declared weights of a course.
    pub fn current_total_weight(&self, course: &CourseId) -> Result<f64, CourseworkError> {
        Ok(total_weight(&self.store.load_course(course)?.value.items))
    }

    /// Add an item. Fails with `WeightExceeded` if the course budget cannot
    /// take `weight`.
    pub fn add_item(&self, course: &CourseId, name: &str, weight: f64) -> Result<CourseworkItem, CourseworkError> {
        validate_weight(weight)?;
        let name = validate_name(name)?;

        let item = self.mutate(course, |items| {
            check_budget(total_weight(items), weight)?;
            let item = CourseworkItem {
                id: CourseworkId::new(),
                course_id: course.clone(),
                name: name.clone(),
                weight,
                grade: None,
                quiz_id: None,
            };
            items.push(item.clone());
            Ok(item)
        })?;

        info!(course = %course, item = %item.id, weight, "coursework added");
        Ok(item)
    }

    /// Change an item's weight, checked against the total without its old
    /// weight.
    pub fn update_weight(&self, id: CourseworkId, new_weight: f64) -> Result<CourseworkItem, CourseworkError> {
        validate_weight(new_weight)?;
        let course = self.course_of(id)?;

        let item = self.mutate(&course, |items| {
            let others: f64 = items.iter().filter(|i| i.id != id).map(|i| i.weight).sum();
            check_budget(others, new_weight)?;
            let item = find_item(items, id)?;
            item.weight = new_weight;
            Ok(item.clone())
        })?;

        info!(course = %course, item = %id, weight = new_weight, "coursework weight updated");
        Ok(item)
    }

    /// Remove an item and free its weight. Removing an unknown item is a
    /// no-op returning `None`.
    pub fn remove_item(&self, id: CourseworkId) -> Result<Option<CourseworkItem>, CourseworkError> {
        let Some(course) = self.store.locate_item(id)? else {
            return Ok(None);
        };

        let removed = self.mutate(&course, |items| {
            let position = items.iter().position(|i| i.id == id);
            Ok(position.map(|p| items.remove(p)))
        })?;

        if removed.is_some() {
            info!(course = %course, item = %id, "coursework removed");
        }
        Ok(removed)
    }

    pub fn rename_item(&self, id: CourseworkId, name: &str) -> Result<CourseworkItem, CourseworkError> {
        let name = validate_name(name)?;
        let course = self.course_of(id)?;
        self.mutate(&course, |items| {
            let item = find_item(items, id)?;
            item.name = name.clone();
            Ok(item.clone())
        })
    }

    /// Set the grade of an ungraded item. Existing grades are never
    /// overwritten here; use [`edit_grade`](Self::edit_grade).
    pub fn record_grade(&self, id: CourseworkId, grade: f64) -> Result<CourseworkItem, CourseworkError> {
        validate_grade(grade)?;
        let course = self.course_of(id)?;

        self.mutate(&course, |items| {
            let item = find_item(items, id)?;
            if item.quiz_id.is_some() {
                return Err(CourseworkError::LinkedToQuiz(id));
            }
            if item.grade.is_some() {
                return Err(CourseworkError::GradeAlreadySet(id));
            }
            item.grade = Some(grade);
            Ok(item.clone())
        })
    }

    /// Explicitly overwrite an item's grade. Quiz-backed items are graded
    /// only by their quiz.
    pub fn edit_grade(&self, id: CourseworkId, grade: f64) -> Result<CourseworkItem, CourseworkError> {
        validate_grade(grade)?;
        let course = self.course_of(id)?;

        let item = self.mutate(&course, |items| {
            let item = find_item(items, id)?;
            if item.quiz_id.is_some() {
                return Err(CourseworkError::LinkedToQuiz(id));
            }
            item.grade = Some(grade);
            Ok(item.clone())
        })?;

        info!(course = %course, item = %id, grade, "coursework grade edited");
        Ok(item)
    }

    /// Back an item's grade with a quiz. A completed quiz grades the item
    /// right away; otherwise the grade arrives when the quiz is submitted.
    pub fn link_quiz(&self, id: CourseworkId, quiz: &Quiz) -> Result<CourseworkItem, CourseworkError> {
        let course = self.course_of(id)?;
        if quiz.course_id != course {
            return Err(CourseworkError::CourseMismatch {
                quiz: quiz.id,
                quiz_course: quiz.course_id.clone(),
                course,
            });
        }

        self.mutate(&course, |items| {
            if items.iter().any(|i| i.id != id && i.quiz_id == Some(quiz.id)) {
                return Err(CourseworkError::QuizAlreadyLinked(quiz.id));
            }
            let item = find_item(items, id)?;
            match item.quiz_id {
                Some(existing) if existing == quiz.id => return Ok(item.clone()),
                Some(existing) => {
                    return Err(CourseworkError::ItemAlreadyLinked {
                        item: id,
                        quiz: existing,
                    })
                }
                None => {}
            }
            if item.grade.is_some() {
                return Err(CourseworkError::GradeAlreadySet(id));
            }
            item.quiz_id = Some(quiz.id);
            if quiz.state() == QuizState::Completed {
                item.grade = quiz.score();
            }
            Ok(item.clone())
        })
    }

    /// Copy a completed quiz's score onto the item it backs, if any. Items
    /// that already carry a grade keep it.
    pub fn apply_quiz_score(&self, quiz: &Quiz) -> Result<Option<CourseworkItem>, CourseworkError> {
        let Some(score) = quiz.score() else {
            return Ok(None);
        };

        let ledger = self.store.load_course(&quiz.course_id)?.value;
        let Some(linked) = ledger.items.iter().find(|i| i.quiz_id == Some(quiz.id)) else {
            return Ok(None);
        };
        if linked.grade.is_some() {
            return Ok(Some(linked.clone()));
        }

        let item = self.mutate(&quiz.course_id, |items| {
            let Some(item) = items.iter_mut().find(|i| i.quiz_id == Some(quiz.id)) else {
                return Ok(None);
            };
            if item.grade.is_none() {
                item.grade = Some(score);
            }
            Ok(Some(item.clone()))
        })?;

        if let Some(item) = &item {
            info!(course = %quiz.course_id, item = %item.id, quiz = %quiz.id, score, "quiz score applied to coursework");
        }
        Ok(item)
    }

    fn course_of(&self, id: CourseworkId) -> Result<CourseId, CourseworkError> {
        self.store
            .locate_item(id)?
            .ok_or(CourseworkError::ItemNotFound(id))
    }

    /// Run `f` against a working copy of the course's items and commit the
    /// result together with the recomputed final grade. `f` may run again if
    /// another writer committed first.
    fn mutate<T, F>(&self, course: &CourseId, mut f: F) -> Result<T, CourseworkError>
    where
        F: FnMut(&mut Vec<CourseworkItem>) -> Result<T, CourseworkError>,
    {
        for attempt in 1..=self.max_attempts {
            let loaded = self.store.load_course(course)?;
            let mut ledger = loaded.value;
            let out = f(&mut ledger.items)?;

            debug_assert!(total_weight(&ledger.items) <= 1.0 + WEIGHT_EPSILON);
            ledger.final_grade = WeightedGradeAggregator::recompute(&ledger.items).final_grade;

            match self.store.commit_course(&ledger, loaded.version) {
                Ok(_) => return Ok(out),
                Err(StoreError::VersionConflict { expected, actual }) => {
                    warn!(course = %course, attempt, expected, actual, "coursework commit lost a race, re-validating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CourseworkError::Conflict(course.clone()))
    }
}
