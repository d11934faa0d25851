//! The `studyquiz validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use studyquiz_core::parser::parse_quiz_draft;
use studyquiz_core::traits::extract_json_payload;

/// Check a saved provider reply the same way generated quizzes are checked.
pub fn execute(file: PathBuf, questions: usize) -> Result<()> {
    let reply = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let draft = parse_quiz_draft(&extract_json_payload(&reply), questions)?;

    println!("Quiz: {} ({} questions)", draft.name, draft.questions.len());
    for question in &draft.questions {
        println!(
            "  {}. {} [{} options, answer {}]",
            question.id,
            question.prompt,
            question.options.len(),
            question.correct_label
        );
    }
    println!("Payload valid.");

    Ok(())
}
