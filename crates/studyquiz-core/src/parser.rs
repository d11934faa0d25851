//! AI quiz payload parser.
//!
//! The provider's JSON is untrusted: it is parsed into loose intermediate
//! structures, every question is checked in order, and the first bad one
//! rejects the whole draft. Option labels are reassigned by position so the
//! correct answer resolves the same way whatever labels the model used.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::GenerationError;
use crate::model::{DraftQuestion, OptionLabel, QuizDraft, QuizOption};

/// Intermediate structure for the top-level payload.
#[derive(Debug, Deserialize)]
struct RawQuizPayload {
    #[serde(default)]
    quiz_name: Option<String>,
    #[serde(default)]
    questions: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    options: Option<Vec<Value>>,
    #[serde(default)]
    correct_answer: Option<String>,
}

/// Parse and validate a quiz payload that must hold exactly
/// `expected_questions` questions.
pub fn parse_quiz_draft(payload: &str, expected_questions: usize) -> Result<QuizDraft, GenerationError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    if !value.is_object() {
        return Err(GenerationError::schema(None, "response is not a JSON object"));
    }
    let raw: RawQuizPayload = serde_json::from_value(value)
        .map_err(|e| GenerationError::schema(None, format!("unexpected quiz shape: {e}")))?;

    let name = raw
        .quiz_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GenerationError::schema(None, "quiz_name is missing or empty"))?;

    let raw_questions = raw
        .questions
        .ok_or_else(|| GenerationError::schema(None, "questions array is missing"))?;
    if raw_questions.is_empty() {
        return Err(GenerationError::schema(None, "questions array is empty"));
    }

    let questions = raw_questions
        .into_iter()
        .enumerate()
        .map(|(index, value)| parse_question(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    if questions.len() != expected_questions {
        return Err(GenerationError::schema(
            None,
            format!(
                "expected {expected_questions} questions, got {}",
                questions.len()
            ),
        ));
    }

    Ok(QuizDraft { name, questions })
}

fn parse_question(index: usize, value: Value) -> Result<DraftQuestion, GenerationError> {
    let violation = |reason: String| GenerationError::schema(Some(index), reason);

    if !value.is_object() {
        return Err(violation("question is not a JSON object".into()));
    }
    let raw: RawQuestion =
        serde_json::from_value(value).map_err(|e| violation(format!("unexpected question shape: {e}")))?;

    let prompt = raw
        .question
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| violation("question text is missing or empty".into()))?;

    let raw_options = raw
        .options
        .ok_or_else(|| violation("options are missing".into()))?;
    if raw_options.len() < 2 {
        return Err(violation(format!(
            "needs at least 2 options, got {}",
            raw_options.len()
        )));
    }
    if raw_options.len() > OptionLabel::MAX_OPTIONS {
        return Err(violation(format!(
            "at most {} options are supported, got {}",
            OptionLabel::MAX_OPTIONS,
            raw_options.len()
        )));
    }

    let mut options = Vec::with_capacity(raw_options.len());
    let mut seen = HashSet::new();
    for (position, option) in raw_options.iter().enumerate() {
        let Value::String(text) = option else {
            return Err(violation(format!("option {position} is not a string")));
        };
        let label = OptionLabel::from_index(position)
            .ok_or_else(|| violation(format!("option {position} has no label")))?;
        let text = strip_label_prefix(text, label).trim().to_string();
        if text.is_empty() {
            return Err(violation(format!("option {label} is empty")));
        }
        if !seen.insert(text.to_lowercase()) {
            return Err(violation(format!("option {label} duplicates another option")));
        }
        options.push(QuizOption { label, text });
    }

    let answer = raw
        .correct_answer
        .ok_or_else(|| violation("correct_answer is missing".into()))?;
    let correct_label = resolve_correct_answer(&answer, &options)
        .ok_or_else(|| violation(format!("correct_answer '{answer}' is not one of the options")))?;

    Ok(DraftQuestion {
        id: index as u32 + 1,
        prompt,
        options,
        correct_label,
    })
}

/// Drop a leading `A)`, `A.`, `A:` or `(A)` that repeats the option's own
/// label.
fn strip_label_prefix(text: &str, label: OptionLabel) -> &str {
    let trimmed = text.trim_start();
    let letter = label.as_char();

    let rest = trimmed
        .strip_prefix('(')
        .and_then(|r| r.strip_prefix([letter, letter.to_ascii_lowercase()]))
        .and_then(|r| r.strip_prefix(')'))
        .or_else(|| {
            trimmed
                .strip_prefix([letter, letter.to_ascii_lowercase()])
                .and_then(|r| r.strip_prefix([')', '.', ':']))
        });

    match rest {
        Some(r) if r.starts_with(char::is_whitespace) => r,
        _ => trimmed,
    }
}

/// Resolve the model's answer to a canonical label, either from a label
/// spelling (`"b"`, `"(B)"`) or from the text of an option.
fn resolve_correct_answer(answer: &str, options: &[QuizOption]) -> Option<OptionLabel> {
    if let Ok(label) = answer.parse::<OptionLabel>() {
        return options.iter().find(|o| o.label == label).map(|o| o.label);
    }

    let wanted = answer.trim().to_lowercase();
    options
        .iter()
        .find(|o| {
            o.text.to_lowercase() == wanted
                || strip_label_prefix(answer, o.label).trim().to_lowercase() == o.text.to_lowercase()
        })
        .map(|o| o.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_json(id: u32, correct: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "question": format!("Question {id}?"),
            "options": ["Alpha", "Beta", "Gamma", "Delta"],
            "correct_answer": correct,
        })
    }

    fn payload(questions: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "quiz_name": "Greek Letters", "questions": questions }).to_string()
    }

    fn label(c: char) -> OptionLabel {
        c.to_string().parse().unwrap()
    }

    #[test]
    fn parse_valid_payload() {
        let input = payload((1..=3).map(|i| question_json(i, "B")).collect());
        let draft = parse_quiz_draft(&input, 3).unwrap();
        assert_eq!(draft.name, "Greek Letters");
        assert_eq!(draft.questions.len(), 3);
        for (i, q) in draft.questions.iter().enumerate() {
            assert_eq!(q.id, i as u32 + 1);
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.correct_label, label('B'));
            assert_eq!(q.options[3].label, label('D'));
        }
    }

    #[test]
    fn lowercase_and_parenthesized_answers() {
        let input = payload(vec![
            question_json(1, "c"),
            question_json(2, "(a)"),
            question_json(3, "d)"),
        ]);
        let draft = parse_quiz_draft(&input, 3).unwrap();
        let labels: Vec<_> = draft.questions.iter().map(|q| q.correct_label).collect();
        assert_eq!(labels, vec![label('C'), label('A'), label('D')]);
    }

    #[test]
    fn answer_given_as_option_text() {
        let input = payload(vec![question_json(1, "gamma"), question_json(2, "C) Gamma")]);
        let draft = parse_quiz_draft(&input, 2).unwrap();
        assert_eq!(draft.questions[0].correct_label, label('C'));
        assert_eq!(draft.questions[1].correct_label, label('C'));
    }

    #[test]
    fn option_label_prefixes_are_stripped() {
        let input = serde_json::json!({
            "quiz_name": "Prefixed",
            "questions": [{
                "id": 7,
                "question": "Pick one",
                "options": ["A) Red", "B. Green", "(C) Blue", "D: Yellow"],
                "correct_answer": "B"
            }]
        })
        .to_string();
        let draft = parse_quiz_draft(&input, 1).unwrap();
        let texts: Vec<_> = draft.questions[0].options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Red", "Green", "Blue", "Yellow"]);
        assert_eq!(draft.questions[0].id, 1);
    }

    #[test]
    fn option_text_starting_with_letter_is_kept() {
        assert_eq!(strip_label_prefix("A.I. safety", label('A')), "A.I. safety");
        assert_eq!(strip_label_prefix("Apple", label('A')), "Apple");
        assert_eq!(strip_label_prefix("a) apple", label('A')), "apple");
    }

    #[test]
    fn malformed_json() {
        let err = parse_quiz_draft("{ not json", 1).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn missing_correct_answer_names_the_question() {
        let mut second = question_json(2, "A");
        second.as_object_mut().unwrap().remove("correct_answer");
        let input = payload(vec![question_json(1, "A"), second, question_json(3, "A")]);
        let err = parse_quiz_draft(&input, 3).unwrap_err();
        match err {
            GenerationError::SchemaViolation { question, reason } => {
                assert_eq!(question, Some(1));
                assert!(reason.contains("correct_answer"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fewer_than_two_options() {
        let input = serde_json::json!({
            "quiz_name": "Thin",
            "questions": [{ "id": 1, "question": "Only one?", "options": ["Yes"], "correct_answer": "A" }]
        })
        .to_string();
        let err = parse_quiz_draft(&input, 1).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::SchemaViolation {
                question: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn duplicate_options_rejected() {
        let input = serde_json::json!({
            "quiz_name": "Dupes",
            "questions": [{ "id": 1, "question": "Same?", "options": ["Same", "same", "Other", "Else"], "correct_answer": "A" }]
        })
        .to_string();
        assert!(matches!(
            parse_quiz_draft(&input, 1).unwrap_err(),
            GenerationError::SchemaViolation { question: Some(0), .. }
        ));
    }

    #[test]
    fn answer_outside_options_rejected() {
        let input = payload(vec![question_json(1, "E")]);
        assert!(matches!(
            parse_quiz_draft(&input, 1).unwrap_err(),
            GenerationError::SchemaViolation { question: Some(0), .. }
        ));
        let input = payload(vec![question_json(1, "Omega")]);
        assert!(parse_quiz_draft(&input, 1).is_err());
    }

    #[test]
    fn empty_or_wrong_question_count() {
        let err = parse_quiz_draft(&payload(vec![]), 1).unwrap_err();
        assert!(matches!(err, GenerationError::SchemaViolation { question: None, .. }));

        let input = payload(vec![question_json(1, "A"), question_json(2, "A")]);
        let err = parse_quiz_draft(&input, 3).unwrap_err();
        assert!(err.to_string().contains("expected 3 questions, got 2"));
    }

    #[test]
    fn missing_name_or_questions() {
        let err = parse_quiz_draft(r#"{"questions": []}"#, 1).unwrap_err();
        assert!(err.to_string().contains("quiz_name"));
        let err = parse_quiz_draft(r#"{"quiz_name": "x"}"#, 1).unwrap_err();
        assert!(err.to_string().contains("questions array is missing"));
        let err = parse_quiz_draft("[1, 2]", 1).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn non_string_option_rejected() {
        let input = serde_json::json!({
            "quiz_name": "Numbers",
            "questions": [{ "id": 1, "question": "1+1", "options": [1, 2, 3, 4], "correct_answer": "B" }]
        })
        .to_string();
        let err = parse_quiz_draft(&input, 1).unwrap_err();
        assert!(err.to_string().contains("not a string"));
    }
}
