//! Line-based front end: input parsing and snapshot rendering.

use std::fmt::Write;

use crate::game::GameSnapshot;

const DATA_URL_PREVIEW: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Guess(&'a str),
    Show,
    Names,
    Help,
    Quit,
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => Command::Quit,
            "/show" => Command::Show,
            "/names" => Command::Names,
            "/help" => Command::Help,
            guess => Command::Guess(guess),
        }
    }
}

pub const HELP: &str = "Type a country name to guess. Commands: /show /names /help /quit";

/// Data URLs are shortened; anything else is printed as is.
pub fn display_image_ref(image_ref: &str) -> String {
    if image_ref.starts_with("data:") && image_ref.len() > DATA_URL_PREVIEW {
        let prefix: String = image_ref.chars().take(DATA_URL_PREVIEW).collect();
        format!("{prefix}... ({} bytes)", image_ref.len())
    } else {
        image_ref.to_string()
    }
}

pub fn render(snapshot: &GameSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Daily Flag {} ==", snapshot.iso_date.format("%Y-%m-%d"));
    let _ = writeln!(out, "Flag: {}", display_image_ref(&snapshot.image_ref));

    if let Some(hint) = &snapshot.hint {
        let _ = writeln!(out, "Hint: {hint}");
    }

    for guess in &snapshot.guesses {
        let mark = if guess.was_correct { "🟩" } else { "🟥" };
        let _ = writeln!(out, "  {mark} {}", guess.text);
    }

    if snapshot.is_over {
        if let Some(name) = &snapshot.revealed_name {
            let _ = writeln!(out, "The answer was {name}.");
        }
    } else {
        let _ = writeln!(out, "Guesses left: {}", snapshot.guesses_left);
    }

    let _ = writeln!(out, "Next flag in {}", snapshot.countdown);
    out
}
