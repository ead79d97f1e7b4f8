//! Turning model output into a validated multiple-choice flashcard.
//!
//! The model is asked for JSON. Output that is not JSON is read as a lettered
//! block instead:
//!
//! ```text
//! Which organelle produces ATP?
//! A. Ribosome
//! B. *Mitochondrion
//! C. Golgi apparatus
//! ```
//!
//! where `*` marks the correct answer (a trailing `Answer: B` line also works).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use neuronote_core::{Error, Result};

use crate::types::{AnswerDraft, FlashcardDraft};

static ANSWER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(?([A-Ea-e])[.)]\s+(.+)$").unwrap());
static ANSWER_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:correct\s+answer|answer)\s*[:\-]\s*\(?([A-E])\)?\b").unwrap()
});
static QUESTION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:question|q)\s*[:.]\s*").unwrap());

#[derive(Deserialize)]
struct RawCard {
    question: String,
    answers: Vec<RawAnswer>,
}

#[derive(Deserialize)]
struct RawAnswer {
    text: String,
    #[serde(default)]
    correct: bool,
}

/// Parse and validate a flashcard from raw model output.
pub fn parse_flashcard(response: &str) -> Result<FlashcardDraft> {
    let draft = parse_json(response)
        .or_else(|| parse_lettered(response))
        .ok_or_else(|| {
            Error::GenerationFailed("Could not read a flashcard from the model output".into())
        })?;
    validate(draft)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) and the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_json(response: &str) -> Option<FlashcardDraft> {
    let body = strip_code_fence(response);
    let raw: RawCard = serde_json::from_str(body).ok().or_else(|| {
        // Tolerate prose around a single JSON object.
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        serde_json::from_str(body.get(start..=end)?).ok()
    })?;
    Some(FlashcardDraft {
        question: raw.question,
        answers: raw
            .answers
            .into_iter()
            .map(|a| AnswerDraft {
                text: a.text,
                correct: a.correct,
            })
            .collect(),
    })
}

fn parse_lettered(response: &str) -> Option<FlashcardDraft> {
    let mut question_lines: Vec<String> = Vec::new();
    let mut answers: Vec<(char, AnswerDraft)> = Vec::new();
    let mut keyed_letter: Option<char> = None;

    for line in strip_code_fence(response).lines() {
        let line = line.trim().trim_start_matches(['-', '•']).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = ANSWER_KEY.captures(line) {
            keyed_letter = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
            continue;
        }
        if let Some(caps) = ANSWER_LINE.captures(line) {
            let letter = caps[1].chars().next().map(|c| c.to_ascii_uppercase())?;
            // Answers follow the question and run A, B, C... in order; any
            // other lettered line ("E. coli is...") is question text.
            if !question_lines.is_empty() && letter == next_letter(answers.len()) {
                let raw = &caps[2];
                answers.push((
                    letter,
                    AnswerDraft {
                        text: raw.replace('*', "").trim().to_string(),
                        correct: raw.contains('*'),
                    },
                ));
                continue;
            }
        }
        if answers.is_empty() {
            question_lines.push(QUESTION_PREFIX.replace(line, "").trim().to_string());
        }
    }

    if answers.is_empty() || question_lines.is_empty() {
        return None;
    }
    if let Some(key) = keyed_letter {
        if !answers.iter().any(|(_, a)| a.correct) {
            for (letter, answer) in &mut answers {
                answer.correct = *letter == key;
            }
        }
    }

    Some(FlashcardDraft {
        question: question_lines.join(" ").trim().to_string(),
        answers: answers.into_iter().map(|(_, a)| a).collect(),
    })
}

fn next_letter(index: usize) -> char {
    (b'A' + index.min(25) as u8) as char
}

fn validate(mut draft: FlashcardDraft) -> Result<FlashcardDraft> {
    draft.question = draft.question.trim().to_string();
    if draft.question.is_empty() {
        return Err(Error::GenerationFailed("Flashcard has no question".into()));
    }
    draft.answers.retain(|a| !a.text.trim().is_empty());
    for answer in &mut draft.answers {
        answer.text = answer.text.trim().to_string();
    }
    if draft.answers.len() < 2 {
        return Err(Error::GenerationFailed(
            "Flashcard needs at least two answers".into(),
        ));
    }
    let correct = draft.answers.iter().filter(|a| a.correct).count();
    if correct != 1 {
        return Err(Error::GenerationFailed(format!(
            "Flashcard needs exactly one correct answer, got {}",
            correct
        )));
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct_text(draft: &FlashcardDraft) -> &str {
        draft
            .answers
            .iter()
            .find(|a| a.correct)
            .map(|a| a.text.as_str())
            .unwrap()
    }

    #[test]
    fn test_json() {
        let draft = parse_flashcard(
            r#"{"question": "What makes ATP?", "answers": [
                {"text": "Ribosome", "correct": false},
                {"text": "Mitochondrion", "correct": true},
                {"text": "Nucleus"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(draft.question, "What makes ATP?");
        assert_eq!(draft.answers.len(), 3);
        assert_eq!(correct_text(&draft), "Mitochondrion");
    }

    #[test]
    fn test_json_in_code_fence_and_prose() {
        let fenced = "```json\n{\"question\": \"Q?\", \"answers\": [{\"text\": \"a\", \"correct\": true}, {\"text\": \"b\"}]}\n```";
        assert_eq!(correct_text(&parse_flashcard(fenced).unwrap()), "a");

        let chatty = "Sure! Here it is:\n{\"question\": \"Q?\", \"answers\": [{\"text\": \"a\"}, {\"text\": \"b\", \"correct\": true}]}\nGood luck.";
        assert_eq!(correct_text(&parse_flashcard(chatty).unwrap()), "b");
    }

    #[test]
    fn test_lettered_with_star() {
        let draft = parse_flashcard(
            "Question: Which organelle produces ATP?\nA. Ribosome\nB. *Mitochondrion*\nC) Golgi apparatus\nD. Lysosome",
        )
        .unwrap();
        assert_eq!(draft.question, "Which organelle produces ATP?");
        assert_eq!(draft.answers.len(), 4);
        assert_eq!(correct_text(&draft), "Mitochondrion");
        assert_eq!(draft.answers[2].text, "Golgi apparatus");
    }

    #[test]
    fn test_lettered_with_answer_key() {
        let draft = parse_flashcard(
            "What is 2 + 2?\n\na. 3\nb. 4\nc. 5\n\nCorrect answer: B",
        )
        .unwrap();
        assert_eq!(correct_text(&draft), "4");
    }

    #[test]
    fn test_multiline_question() {
        let draft = parse_flashcard(
            "In the electron transport chain,\nwhich molecule is the final electron acceptor?\nA. *Oxygen\nB. Water",
        )
        .unwrap();
        assert_eq!(
            draft.question,
            "In the electron transport chain, which molecule is the final electron acceptor?"
        );
    }

    #[test]
    fn test_question_starting_with_a_letter() {
        let draft = parse_flashcard(
            "E. coli is a common gut bacterium.\nWhat shape is it?\nA. Coccus\nB. *Rod\nC. Spiral",
        )
        .unwrap();
        assert_eq!(
            draft.question,
            "E. coli is a common gut bacterium. What shape is it?"
        );
        assert_eq!(draft.answers.len(), 3);
        assert_eq!(correct_text(&draft), "Rod");

        let single_line = parse_flashcard("C. elegans is a model organism for what?\nA. *Development\nB. Astronomy").unwrap();
        assert_eq!(single_line.question, "C. elegans is a model organism for what?");
        assert_eq!(correct_text(&single_line), "Development");
    }

    #[test]
    fn test_rejects_malformed_output() {
        let cases = [
            "",
            "   \n  ",
            "I cannot make a flashcard from this.",
            // Answers without a question.
            "A. *yes\nB. no",
            // Only one answer.
            "Q?\nA. *only",
            // No correct answer marked.
            "Q?\nA. one\nB. two",
            // Two correct answers.
            "Q?\nA. *one\nB. *two",
            // Blank answer texts do not count.
            "Q?\nA. *right\nB. *",
            // JSON with the wrong number of correct answers.
            r#"{"question": "Q?", "answers": [{"text": "a", "correct": true}, {"text": "b", "correct": true}]}"#,
            // JSON with an empty question.
            r#"{"question": "  ", "answers": [{"text": "a", "correct": true}, {"text": "b"}]}"#,
            // Truncated JSON, nothing lettered either.
            r#"{"question": "Q?", "answers": [{"text": "a", "#,
        ];
        for case in cases {
            assert!(
                matches!(parse_flashcard(case), Err(Error::GenerationFailed(_))),
                "accepted malformed output: {:?}",
                case
            );
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  plain  "), "plain");
        assert_eq!(strip_code_fence("```json"), "");
    }
}
