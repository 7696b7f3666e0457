//! The guess/hint state machine.
//!
//! Pure: nothing here touches storage or the clock. Hint levels run 0..=4 and
//! a wrong answer at level 4 is the last one accepted.

use serde::Serialize;
use std::fmt;

use crate::models::{Subject, MAX_HINT_LEVEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Hint {
    UnblurredFlag,
    Population(u64),
    Region(String),
    Capital(String),
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::UnblurredFlag => write!(f, "Unblurred Flag"),
            Hint::Population(population) => {
                write!(f, "Population: {}", group_thousands(*population))
            }
            Hint::Region(region) => write!(f, "Continent: {region}"),
            Hint::Capital(capital) => write!(f, "Capital: {capital}"),
        }
    }
}

/// Hint unlocked by a wrong guess made at `level`; none past level 3.
pub fn hint_for_level(subject: &Subject, level: u8) -> Option<Hint> {
    match level {
        0 => Some(Hint::UnblurredFlag),
        1 => Some(Hint::Population(subject.population)),
        2 => Some(Hint::Region(subject.region.clone())),
        3 => Some(Hint::Capital(subject.capital.clone())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub correct: bool,
    /// Hint level after this guess.
    pub hint_level: u8,
    pub hint: Option<Hint>,
    pub revealed_image: String,
    pub revealed_name: Option<String>,
    pub is_terminal: bool,
}

/// Trimmed, case-insensitive, exact.
pub fn is_correct_guess(subject: &Subject, guess: &str) -> bool {
    guess.trim().to_lowercase() == subject.display_name.trim().to_lowercase()
}

pub fn evaluate(subject: &Subject, guess: &str, hint_level: u8) -> Evaluation {
    let level = hint_level.min(MAX_HINT_LEVEL);
    let correct = is_correct_guess(subject, guess);

    if correct || level >= MAX_HINT_LEVEL {
        return Evaluation {
            correct,
            hint_level: level,
            hint: None,
            revealed_image: subject.source_image_ref.clone(),
            revealed_name: Some(subject.display_name.clone()),
            is_terminal: true,
        };
    }

    Evaluation {
        correct: false,
        hint_level: level + 1,
        hint: hint_for_level(subject, level),
        revealed_image: subject.source_image_ref.clone(),
        revealed_name: None,
        is_terminal: false,
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
