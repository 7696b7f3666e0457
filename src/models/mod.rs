pub mod session;
pub mod subject;

pub use session::{DailyCacheEntry, GameSession, GuessRecord, MAX_HINT_LEVEL};
pub use subject::{Subject, SubjectPool, SubjectRecord};
