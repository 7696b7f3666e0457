pub mod hints;
pub mod progress;
pub mod reveal;
pub mod service;

pub use hints::{evaluate, hint_for_level, is_correct_guess, Evaluation, Hint};
pub use progress::{completed_key, SessionRepository, SESSION_KEY};
pub use reveal::RevealPolicy;
pub use service::{
    GameService, GameSnapshot, GuessOutcome, Lifecycle, ServiceOptions, MSG_CORRECT,
    MSG_GAME_OVER, MSG_WRONG,
};
