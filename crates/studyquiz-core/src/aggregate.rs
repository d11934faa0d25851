//! Weighted course grade roll-up.
//!
//! Policy: `final_grade = Σ grade_i × weight_i` over graded items, using each
//! item's declared weight without renormalizing. An ungraded item adds
//! nothing, so the final grade of an unfinished course is a lower bound on
//! its eventual total.

use serde::{Deserialize, Serialize};

use crate::model::CourseworkItem;

/// Derived grade figures for one course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CourseGrade {
    /// Weighted sum over graded items, in percent.
    pub final_grade: f64,
    /// Sum of the weights of graded items.
    pub graded_weight: f64,
    /// Sum of all declared weights.
    pub total_weight: f64,
    pub graded_items: usize,
    pub ungraded_items: usize,
}

impl CourseGrade {
    /// Average over the graded weight only. A projection of where the course
    /// is heading, never the course grade itself.
    pub fn projected(&self) -> Option<f64> {
        if self.graded_weight > 0.0 {
            Some(self.final_grade / self.graded_weight)
        } else {
            None
        }
    }
}

/// Recomputes course grades. Pure over the coursework collection.
pub struct WeightedGradeAggregator;

impl WeightedGradeAggregator {
    pub fn recompute(items: &[CourseworkItem]) -> CourseGrade {
        let mut grade = CourseGrade {
            final_grade: 0.0,
            graded_weight: 0.0,
            total_weight: 0.0,
            graded_items: 0,
            ungraded_items: 0,
        };

        for item in items {
            grade.total_weight += item.weight;
            match item.grade {
                Some(g) => {
                    grade.final_grade += g * item.weight;
                    grade.graded_weight += item.weight;
                    grade.graded_items += 1;
                }
                None => grade.ungraded_items += 1,
            }
        }

        grade
    }
}

/// Sum of declared weights.
pub fn total_weight(items: &[CourseworkItem]) -> f64 {
    items.iter().map(|i| i.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, CourseworkId};

    fn item(weight: f64, grade: Option<f64>) -> CourseworkItem {
        CourseworkItem {
            id: CourseworkId::new(),
            course_id: CourseId::new("c1"),
            name: "item".into(),
            weight,
            grade,
            quiz_id: None,
        }
    }

    #[test]
    fn ungraded_items_contribute_nothing() {
        let grade = WeightedGradeAggregator::recompute(&[item(0.5, Some(80.0)), item(0.5, None)]);
        assert!((grade.final_grade - 40.0).abs() < 1e-9);
        assert!((grade.graded_weight - 0.5).abs() < 1e-9);
        assert!((grade.total_weight - 1.0).abs() < 1e-9);
        assert_eq!((grade.graded_items, grade.ungraded_items), (1, 1));
        assert!((grade.projected().unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_sum_of_graded_items() {
        let grade = WeightedGradeAggregator::recompute(&[
            item(0.2, Some(87.0)),
            item(0.1, Some(92.0)),
            item(0.15, Some(75.0)),
        ]);
        let expected = 87.0 * 0.2 + 92.0 * 0.1 + 75.0 * 0.15;
        assert!((grade.final_grade - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_course() {
        let grade = WeightedGradeAggregator::recompute(&[]);
        assert_eq!(grade.final_grade, 0.0);
        assert!(grade.projected().is_none());
        assert_eq!(total_weight(&[]), 0.0);
    }
}
