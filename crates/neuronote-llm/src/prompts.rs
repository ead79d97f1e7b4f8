//! Prompt text and parsing of summary output.

use neuronote_core::{Error, Result};

use crate::types::NoteDraft;

/// Longest document excerpt sent for summarization.
pub const MAX_SOURCE_CHARS: usize = 48_000;

pub const SUMMARY_PROMPT: &str = "You write study notes. Summarize the document the user \
provides into clear, well-structured notes a student can revise from. Start your reply with \
a single line of the form `TITLE: <short title>`, then a blank line, then the notes in Markdown.";

pub const FLASHCARD_PROMPT: &str = "You write exam practice questions. From the study notes the \
user provides, write ONE multiple-choice question with four answers, exactly one of them correct. \
Reply with JSON only, no prose, in this shape: \
{\"question\": \"...\", \"answers\": [{\"text\": \"...\", \"correct\": true}, {\"text\": \"...\", \"correct\": false}]}";

pub fn chat_system_prompt(note_text: &str) -> String {
    format!(
        "You are a patient study tutor. Answer the student's questions using the study note \
below. If the note does not cover something, say so and answer from general knowledge.\n\n\
--- NOTE ---\n{}\n--- END NOTE ---",
        truncate_chars(note_text, MAX_SOURCE_CHARS)
    )
}

/// The first `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split a `TITLE:` line (or a leading Markdown heading) off the summary.
pub fn parse_note_draft(response: &str) -> Result<NoteDraft> {
    let response = response.trim();
    if response.is_empty() {
        return Err(Error::GenerationFailed("Model returned an empty summary".into()));
    }

    let (first, rest) = response.split_once('\n').unwrap_or((response, ""));
    let first = first.trim();
    let title = if first
        .get(..6)
        .is_some_and(|p| p.eq_ignore_ascii_case("title:"))
    {
        first.get(6..).map(str::trim)
    } else if first.starts_with('#') {
        Some(first.trim_start_matches('#').trim())
    } else {
        None
    };

    let draft = match title {
        Some(t) if !t.is_empty() && !rest.trim().is_empty() => NoteDraft {
            title: Some(t.trim_matches(['*', '"']).trim().to_string()),
            text: rest.trim().to_string(),
        },
        _ => NoteDraft {
            title: None,
            text: response.to_string(),
        },
    };
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_line() {
        let draft = parse_note_draft("TITLE: Cell Biology\n\n## Organelles\n- Mitochondria").unwrap();
        assert_eq!(draft.title.as_deref(), Some("Cell Biology"));
        assert_eq!(draft.text, "## Organelles\n- Mitochondria");
    }

    #[test]
    fn test_heading_and_plain() {
        let draft = parse_note_draft("# Photosynthesis\nLight reactions...").unwrap();
        assert_eq!(draft.title.as_deref(), Some("Photosynthesis"));

        let draft = parse_note_draft("Just a summary with no title.").unwrap();
        assert!(draft.title.is_none());
        assert_eq!(draft.text, "Just a summary with no title.");

        // A title with nothing under it is kept as text.
        let draft = parse_note_draft("Title: Lonely").unwrap();
        assert!(draft.title.is_none());
        assert_eq!(draft.text, "Title: Lonely");
    }

    #[test]
    fn test_empty_summary_fails() {
        assert!(matches!(
            parse_note_draft("  \n "),
            Err(Error::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
