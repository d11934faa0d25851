//! The `studyquiz quizzes` and `studyquiz show` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use studyquiz_core::engine::{QuizReview, ReviewMode};
use studyquiz_core::model::CourseId;

use super::{format_grade, parse_quiz_id, Workspace};

pub fn list(course: String, config_path: Option<PathBuf>, state_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;
    let course = CourseId::new(course);
    let quizzes = workspace.engine.quizzes(&course)?;

    if quizzes.is_empty() {
        println!("No quizzes for course {course}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Created", "State", "Questions", "Score"]);
    for quiz in &quizzes {
        table.add_row(vec![
            Cell::new(quiz.id),
            Cell::new(&quiz.name),
            Cell::new(quiz.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(quiz.state),
            Cell::new(quiz.question_count),
            Cell::new(format_grade(quiz.score)),
        ]);
    }
    println!("{table}");

    Ok(())
}

pub fn show(quiz: String, config_path: Option<PathBuf>, state_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;
    let review = workspace.engine.review(parse_quiz_id(&quiz)?)?;
    print_review(&review);
    Ok(())
}

fn print_review(review: &QuizReview) {
    println!("{} [{}]", review.name, review.state);
    if let Some(score) = review.score {
        println!("Score: {score:.1}%");
    }
    println!();

    for question in &review.questions {
        println!("{}. {}", question.id, question.prompt);
        for option in &question.options {
            let chosen = question.chosen == Some(option.label);
            let marker = match review.mode {
                ReviewMode::Review if question.correct == Some(option.label) => "✓",
                ReviewMode::Review if chosen => "✗",
                ReviewMode::Take if chosen => "*",
                _ => " ",
            };
            println!("  {marker} {}) {}", option.label, option.text);
        }
        println!();
    }

    if review.mode == ReviewMode::Take {
        println!("Submit with: studyquiz answer --quiz {} --answers '{{\"1\": \"A\", ...}}'", review.quiz_id);
    }
}
