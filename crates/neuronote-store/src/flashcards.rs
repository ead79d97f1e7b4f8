//! Multiple-choice flashcards derived from notes.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::cascade;
use crate::notes::note_for_owner;
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

fn load_answers(conn: &Connection, flashcard_id: i64) -> Result<Vec<FlashcardAnswer>> {
    conn.prepare_cached(
        "SELECT id, answer_text, is_correct FROM flashcard_answers
         WHERE flashcard_id = ?1 ORDER BY position ASC, id ASC",
    )
    .map_err(db_err)?
    .query_map(params![flashcard_id], SqliteStore::row_to_answer)
    .map_err(db_err)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(db_err)
}

fn with_answers(conn: &Connection, mut cards: Vec<Flashcard>) -> Result<Vec<Flashcard>> {
    for card in &mut cards {
        card.answers = load_answers(conn, card.id)?;
    }
    Ok(cards)
}

fn validate_answers(question: &str, answers: &[NewAnswer]) -> Result<()> {
    if question.trim().is_empty() {
        return Err(Error::MissingField("question".into()));
    }
    if answers.len() < 2 {
        return Err(Error::Validation(
            "A flashcard needs at least two answers".into(),
        ));
    }
    if answers.iter().any(|a| a.text.trim().is_empty()) {
        return Err(Error::Validation("Answer text must not be empty".into()));
    }
    if answers.iter().filter(|a| a.correct).count() != 1 {
        return Err(Error::Validation(
            "A flashcard needs exactly one correct answer".into(),
        ));
    }
    Ok(())
}

impl SqliteStore {
    /// Store a flashcard for an owned note. The title is taken from the note.
    pub fn create_flashcard(
        &self,
        owner_id: i64,
        note_id: i64,
        question: &str,
        answers: &[NewAnswer],
    ) -> Result<Flashcard> {
        validate_answers(question, answers)?;

        let card = self.write_tx(|tx| {
            let note = note_for_owner(tx, note_id, owner_id)?;
            let title = note.title.unwrap_or_else(|| "Untitled note".to_string());
            let now = now_millis();
            let id = tx
                .prepare_cached(
                    "INSERT INTO flashcards (title, question, owner_id, note_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?
                .insert(params![title, question.trim(), owner_id, note_id, now])
                .map_err(db_err)?;

            let mut insert_answer = tx
                .prepare_cached(
                    "INSERT INTO flashcard_answers (flashcard_id, answer_text, is_correct, position)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err)?;
            for (position, answer) in answers.iter().enumerate() {
                insert_answer
                    .execute(params![id, answer.text.trim(), answer.correct, position as i64])
                    .map_err(db_err)?;
            }
            drop(insert_answer);

            Ok(Flashcard {
                id,
                title,
                question: question.trim().to_string(),
                owner_id,
                note_id,
                answers: load_answers(tx, id)?,
                created_at: now,
            })
        })?;

        info!(
            "Created flashcard {} for note {} ({} answers)",
            card.id,
            note_id,
            card.answers.len()
        );
        Ok(card)
    }

    /// Newest first. With `note_id`, only cards of that owned note.
    pub fn list_flashcards(&self, owner_id: i64, note_id: Option<i64>) -> Result<Vec<Flashcard>> {
        self.with_conn(|conn| {
            let cards = match note_id {
                Some(note_id) => {
                    note_for_owner(conn, note_id, owner_id)?;
                    conn.prepare_cached(
                        "SELECT * FROM flashcards WHERE owner_id = ?1 AND note_id = ?2
                         ORDER BY created_at DESC, id DESC",
                    )
                    .map_err(db_err)?
                    .query_map(params![owner_id, note_id], Self::row_to_flashcard)
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?
                }
                None => conn
                    .prepare_cached(
                        "SELECT * FROM flashcards WHERE owner_id = ?1
                         ORDER BY created_at DESC, id DESC",
                    )
                    .map_err(db_err)?
                    .query_map(params![owner_id], Self::row_to_flashcard)
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?,
            };
            with_answers(conn, cards)
        })
    }

    pub fn get_flashcard_for_owner(&self, flashcard_id: i64, owner_id: i64) -> Result<Flashcard> {
        self.with_conn(|conn| {
            let card = conn
                .prepare_cached("SELECT * FROM flashcards WHERE id = ?1 AND owner_id = ?2")
                .map_err(db_err)?
                .query_row(params![flashcard_id, owner_id], Self::row_to_flashcard)
                .optional()
                .map_err(db_err)?
                .ok_or_else(|| Error::NotFound(format!("Flashcard {}", flashcard_id)))?;
            Ok(with_answers(conn, vec![card])?.remove(0))
        })
    }

    /// Answers first, then the card.
    pub fn delete_flashcard(&self, flashcard_id: i64, owner_id: i64) -> Result<CascadeReport> {
        let report = self.write_tx(|tx| {
            let exists = tx
                .prepare_cached("SELECT 1 FROM flashcards WHERE id = ?1 AND owner_id = ?2")
                .map_err(db_err)?
                .exists(params![flashcard_id, owner_id])
                .map_err(db_err)?;
            if !exists {
                return Err(Error::NotFound(format!("Flashcard {}", flashcard_id)));
            }
            let mut report = CascadeReport::default();
            cascade::purge_flashcard(tx, flashcard_id, &mut report)?;
            Ok(report)
        })?;
        info!("Deleted flashcard {}", flashcard_id);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_note, seed_user, test_store};

    fn answers(correct_at: usize, n: usize) -> Vec<NewAnswer> {
        (0..n)
            .map(|i| NewAnswer {
                text: format!("option {}", i),
                correct: i == correct_at,
            })
            .collect()
    }

    #[test]
    fn test_create_keeps_answer_order() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");

        let card = store
            .create_flashcard(alice.id, note.id, " What? ", &answers(2, 4))
            .unwrap();
        assert_eq!(card.title, "Summary");
        assert_eq!(card.question, "What?");
        let texts: Vec<&str> = card.answers.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["option 0", "option 1", "option 2", "option 3"]);
        assert!(card.answers[2].is_correct);
        assert_eq!(card.answers.iter().filter(|a| a.is_correct).count(), 1);
    }

    #[test]
    fn test_untitled_note_title() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (doc, _) = seed_note(&store, alice.id, "a.pdf");
        let untitled = store.create_note(alice.id, doc.id, None, "text").unwrap();
        let card = store
            .create_flashcard(alice.id, untitled.id, "Q", &answers(0, 2))
            .unwrap();
        assert_eq!(card.title, "Untitled note");
    }

    #[test]
    fn test_invalid_answer_sets_rejected() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");

        assert!(store
            .create_flashcard(alice.id, note.id, "Q", &answers(0, 1))
            .is_err());
        assert!(store
            .create_flashcard(alice.id, note.id, "Q", &answers(9, 3))
            .is_err());
        let mut two_correct = answers(0, 3);
        two_correct[1].correct = true;
        assert!(store
            .create_flashcard(alice.id, note.id, "Q", &two_correct)
            .is_err());
        assert!(matches!(
            store.create_flashcard(alice.id, note.id, "", &answers(0, 2)),
            Err(Error::MissingField(_))
        ));
        assert!(store.list_flashcards(alice.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_list_filter_and_isolation() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        let (_, n1) = seed_note(&store, alice.id, "a.pdf");
        let (_, n2) = seed_note(&store, alice.id, "b.pdf");
        let c1 = store.create_flashcard(alice.id, n1.id, "Q1", &answers(0, 2)).unwrap();
        let c2 = store.create_flashcard(alice.id, n2.id, "Q2", &answers(1, 2)).unwrap();

        let all = store.list_flashcards(alice.id, None).unwrap();
        assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), vec![c2.id, c1.id]);
        assert_eq!(all[0].answers.len(), 2);

        let only_n1 = store.list_flashcards(alice.id, Some(n1.id)).unwrap();
        assert_eq!(only_n1.len(), 1);
        assert_eq!(only_n1[0].id, c1.id);

        assert!(store.list_flashcards(bob.id, None).unwrap().is_empty());
        assert!(matches!(
            store.list_flashcards(bob.id, Some(n1.id)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.create_flashcard(bob.id, n1.id, "Q", &answers(0, 2)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_flashcard() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");
        let card = store
            .create_flashcard(alice.id, note.id, "Q", &answers(0, 3))
            .unwrap();

        assert!(matches!(
            store.delete_flashcard(card.id, bob.id),
            Err(Error::NotFound(_))
        ));
        let report = store.delete_flashcard(card.id, alice.id).unwrap();
        assert_eq!((report.flashcards, report.answers), (1, 3));
        assert!(matches!(
            store.get_flashcard_for_owner(card.id, alice.id),
            Err(Error::NotFound(_))
        ));
        assert!(store.integrity_report().unwrap().is_clean());
    }
}
