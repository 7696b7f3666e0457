use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Subject;

/// Highest hint level; a wrong guess at this level ends the game.
pub const MAX_HINT_LEVEL: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuessRecord {
    pub text: String,
    pub was_correct: bool,
    pub hint_level_at_guess: u8,
}

/// One player's progress for one UTC day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub iso_date: NaiveDate,
    pub guesses: Vec<GuessRecord>,
    pub hint_level: u8,
    pub is_over: bool,
    pub revealed_subject_name: Option<String>,
}

impl GameSession {
    pub fn new(iso_date: NaiveDate) -> Self {
        Self {
            iso_date,
            guesses: Vec::new(),
            hint_level: 0,
            is_over: false,
            revealed_subject_name: None,
        }
    }

    pub fn is_for(&self, date: NaiveDate) -> bool {
        self.iso_date == date
    }

    pub fn push_guess(&mut self, record: GuessRecord) {
        self.guesses.push(record);
    }

    /// Moves to the next hint. Saturates at [`MAX_HINT_LEVEL`].
    pub fn advance_hint(&mut self) {
        self.hint_level = (self.hint_level + 1).min(MAX_HINT_LEVEL);
    }

    /// Ends the session. Never reopens one that is already over.
    pub fn finish(&mut self, revealed_name: impl Into<String>) {
        self.is_over = true;
        self.revealed_subject_name = Some(revealed_name.into());
    }

    pub fn last_guess(&self) -> Option<&GuessRecord> {
        self.guesses.last()
    }

    pub fn solved(&self) -> bool {
        self.last_guess().is_some_and(|guess| guess.was_correct)
    }
}

/// Persisted selection for one UTC day. Date and subject are always stored
/// together in a single record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCacheEntry {
    pub iso_date: NaiveDate,
    pub subject: Subject,
}

impl DailyCacheEntry {
    pub fn is_valid_for(&self, date: NaiveDate) -> bool {
        self.iso_date == date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn hint_level_saturates() {
        let mut session = GameSession::new(date());
        for _ in 0..10 {
            session.advance_hint();
        }
        assert_eq!(session.hint_level, MAX_HINT_LEVEL);
    }

    #[test]
    fn session_serializes_date_as_iso_string() {
        let session = GameSession::new(date());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["isoDate"], "2024-03-15");
        assert_eq!(json["hintLevel"], 0);
        assert_eq!(json["isOver"], false);
    }
}
