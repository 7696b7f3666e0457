use serde::{Deserialize, Serialize};

use crate::models::{GameSession, Subject};

/// Which image the player sees at each stage of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RevealPolicy {
    /// Show the obscured image until the first hint is unlocked.
    pub blur_until_first_hint: bool,
    /// Show the source image once the session is over.
    pub unblur_when_over: bool,
}

impl Default for RevealPolicy {
    fn default() -> Self {
        Self {
            blur_until_first_hint: true,
            unblur_when_over: true,
        }
    }
}

impl RevealPolicy {
    pub fn image_for<'a>(&self, subject: &'a Subject, session: &GameSession) -> &'a str {
        let unblurred = (session.is_over && self.unblur_when_over)
            || session.hint_level > 0
            || !self.blur_until_first_hint;

        if unblurred {
            &subject.source_image_ref
        } else {
            &subject.obscured_image_ref
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn subject() -> Subject {
        Subject {
            display_name: "France".into(),
            source_image_ref: "fr.png".into(),
            obscured_image_ref: "fr-blurred.png".into(),
            capital: "Paris".into(),
            region: "Europe".into(),
            population: 67_000_000,
        }
    }

    fn session() -> GameSession {
        GameSession::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn blurred_until_first_hint() {
        let policy = RevealPolicy::default();
        let subject = subject();
        let mut session = session();
        assert_eq!(policy.image_for(&subject, &session), "fr-blurred.png");

        session.advance_hint();
        assert_eq!(policy.image_for(&subject, &session), "fr.png");
    }

    #[test]
    fn solved_on_first_try_shows_source() {
        let subject = subject();
        let mut session = session();
        session.finish("France");

        assert_eq!(RevealPolicy::default().image_for(&subject, &session), "fr.png");

        let keep_blurred = RevealPolicy {
            unblur_when_over: false,
            ..RevealPolicy::default()
        };
        assert_eq!(keep_blurred.image_for(&subject, &session), "fr-blurred.png");
    }

    #[test]
    fn never_blurred_policy() {
        let policy = RevealPolicy {
            blur_until_first_hint: false,
            unblur_when_over: true,
        };
        assert_eq!(policy.image_for(&subject(), &session()), "fr.png");
    }
}
