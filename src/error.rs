use thiserror::Error;

/// Failures the game surfaces to its front end.
///
/// Everything here is recoverable: each variant maps to a message the player
/// can read, and none of them leaves the day unplayable.
#[derive(Debug, Error)]
pub enum GameError {
    /// The pool was empty or could not be fetched within the retry budget.
    #[error("subject pool unavailable: {0}")]
    PoolUnavailable(String),

    /// The selected record is missing a required field.
    #[error("selected subject is malformed: missing {field} at index {index}")]
    MalformedSubject { index: usize, field: &'static str },

    /// A guess arrived after the session ended.
    #[error("game already completed for today")]
    AlreadyCompleted,

    #[error("guess is empty")]
    EmptyGuess,

    /// The service was used before `initialize` or after `dispose`.
    #[error("game service is not active")]
    NotActive,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GameError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GameError::PoolUnavailable(_) | GameError::MalformedSubject { .. } => {
                "Error loading game state."
            }
            GameError::AlreadyCompleted => {
                "You've already completed today's game. Come back tomorrow!"
            }
            GameError::EmptyGuess => "Type a country name to guess.",
            GameError::NotActive => "The game is not running.",
            GameError::Internal(_) => "Error submitting guess",
        }
    }
}

pub type GameResult<T> = std::result::Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_message_matches_front_end_copy() {
        assert_eq!(
            GameError::AlreadyCompleted.user_message(),
            "You've already completed today's game. Come back tomorrow!"
        );
    }

    #[test]
    fn anyhow_errors_convert_to_internal() {
        let err: GameError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, GameError::Internal(_)));
        assert_eq!(err.to_string(), "disk full");
    }
}
