//! The `studyquiz answer` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use studyquiz_core::engine::Submission;

use super::{parse_quiz_id, Workspace};

pub fn execute(
    quiz: String,
    answers: String,
    config_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
) -> Result<()> {
    let submission = parse_submission(&answers)?;
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;

    let graded = workspace.engine.submit(parse_quiz_id(&quiz)?, &submission)?;
    workspace.save()?;

    if !graded.newly_graded {
        println!("Quiz was already submitted; its grade is unchanged.");
    }
    println!(
        "Score: {:.1}% ({}/{} correct)",
        graded.score, graded.correct, graded.total
    );

    Ok(())
}

/// Answers as a JSON object of question id to label, inline or from a file.
fn parse_submission(raw: &str) -> Result<Submission> {
    let json = if Path::new(raw).is_file() {
        std::fs::read_to_string(raw).with_context(|| format!("failed to read {raw}"))?
    } else {
        raw.to_string()
    };
    serde_json::from_str(&json).context("answers must be a JSON object like {\"1\": \"A\"}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_answers_accept_label_spellings() {
        let submission = parse_submission(r#"{"1": "a", "2": "(B)", "3": "C)"}"#).unwrap();
        let labels: Vec<String> = submission.values().map(|l| l.to_string()).collect();
        assert_eq!(labels, ["A", "B", "C"]);
    }

    #[test]
    fn answers_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"2": "D"}"#).unwrap();

        let submission = parse_submission(path.to_str().unwrap()).unwrap();
        assert_eq!(submission.len(), 1);
        assert!(submission.contains_key(&2));
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_submission("[\"A\"]").is_err());
        assert!(parse_submission(r#"{"one": "A"}"#).is_err());
    }
}
