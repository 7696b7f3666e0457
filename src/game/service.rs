use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::clock::{utc_date, Clock};
use crate::db::KeyValueStore;
use crate::error::{GameError, GameResult};
use crate::imaging::ImageObscurer;
use crate::models::{GameSession, GuessRecord, Subject, SubjectPool, MAX_HINT_LEVEL};
use crate::scheduler::{format_countdown, ResetCallback, ResetScheduler};
use crate::selection::{load_pool, string_hash, DailySelector, PoolSource};
use crate::utils::RetryPolicy;

use super::hints::{evaluate, hint_for_level, Evaluation};
use super::progress::SessionRepository;
use super::reveal::RevealPolicy;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const MSG_CORRECT: &str = "Congratulations! You got it right!";
pub const MSG_GAME_OVER: &str = "Game Over! Try again tomorrow!";
pub const MSG_WRONG: &str = "Wrong guess! Here's your next hint:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Created,
    Active,
    Disposed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    pub retry: RetryPolicy,
    pub reveal: RevealPolicy,
}

/// Everything a front end needs to draw the current game.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub iso_date: NaiveDate,
    pub game_id: u32,
    pub image_ref: String,
    pub hint_level: u8,
    pub hint: Option<String>,
    pub guesses: Vec<GuessRecord>,
    pub guesses_left: u8,
    pub is_over: bool,
    pub solved: bool,
    pub revealed_name: Option<String>,
    pub next_reset_secs: Option<u64>,
    pub countdown: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessOutcome {
    pub evaluation: Evaluation,
    pub message: &'static str,
    pub snapshot: GameSnapshot,
}

struct Today {
    subject: Subject,
    session: GameSession,
}

struct ServiceInner {
    lifecycle: Lifecycle,
    pool: Option<SubjectPool>,
    today: Option<Today>,
}

/// Owns one player's daily game: pool, selection, session and the midnight
/// reset.
///
/// Created -> `initialize` -> Active -> `dispose` -> Disposed. Every call other
/// than `initialize` requires Active.
pub struct GameService {
    options: ServiceOptions,
    clock: Arc<dyn Clock>,
    pool_source: Arc<dyn PoolSource>,
    selector: Arc<DailySelector>,
    sessions: SessionRepository,
    scheduler: ResetScheduler,
    inner: Mutex<ServiceInner>,
    cancel: CancellationToken,
}

impl GameService {
    pub fn new(
        options: ServiceOptions,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        pool_source: Arc<dyn PoolSource>,
        obscurer: Arc<dyn ImageObscurer>,
    ) -> Self {
        let selector = Arc::new(DailySelector::new(store.clone(), obscurer));
        let scheduler = ResetScheduler::new(clock.clone(), selector.clone());

        Self {
            options,
            clock,
            pool_source,
            selector,
            sessions: SessionRepository::new(store),
            scheduler,
            inner: Mutex::new(ServiceInner {
                lifecycle: Lifecycle::Created,
                pool: None,
                today: None,
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().await.lifecycle
    }

    /// Loads today's game and arms the reset. `on_reset` runs after each
    /// midnight once the daily cache is gone; it should lead to `refresh`.
    pub async fn initialize(&self, on_reset: ResetCallback) -> GameResult<GameSnapshot> {
        let mut inner = self.inner.lock().await;
        match inner.lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Active => return self.render(&inner).await,
            Lifecycle::Disposed => return Err(GameError::NotActive),
        }

        let date = utc_date(self.clock.now().await);
        self.load_day(&mut inner, date).await?;
        self.scheduler.arm(on_reset).await?;
        inner.lifecycle = Lifecycle::Active;

        log_info!("Game service active for {}", date);
        self.render(&inner).await
    }

    pub async fn snapshot(&self) -> GameResult<GameSnapshot> {
        let mut inner = self.active().await?;
        self.ensure_current_day(&mut inner).await?;
        self.render(&inner).await
    }

    pub async fn submit_guess(&self, guess: &str) -> GameResult<GuessOutcome> {
        let mut inner = self.active().await?;
        self.ensure_current_day(&mut inner).await?;

        let today = inner.today.as_mut().ok_or_else(no_game_loaded)?;
        let date = today.session.iso_date;
        if today.session.is_over || self.sessions.is_completed(date).await? {
            return Err(GameError::AlreadyCompleted);
        }

        let guess = guess.trim();
        if guess.is_empty() {
            return Err(GameError::EmptyGuess);
        }

        let level = today.session.hint_level;
        let evaluation = evaluate(&today.subject, guess, level);
        today.session.push_guess(GuessRecord {
            text: guess.to_string(),
            was_correct: evaluation.correct,
            hint_level_at_guess: level,
        });
        if evaluation.is_terminal {
            today.session.finish(today.subject.display_name.clone());
        } else {
            today.session.advance_hint();
        }

        self.sessions.save(&today.session).await?;
        if today.session.is_over {
            self.sessions.mark_completed(date).await?;
        }

        let message = if evaluation.correct {
            MSG_CORRECT
        } else if evaluation.is_terminal {
            MSG_GAME_OVER
        } else {
            MSG_WRONG
        };
        log_info!(
            "Guess #{} for {}: correct={} hint_level={}",
            today.session.guesses.len(),
            date,
            evaluation.correct,
            today.session.hint_level
        );

        let snapshot = self.render(&inner).await?;
        Ok(GuessOutcome {
            evaluation,
            message,
            snapshot,
        })
    }

    /// Reloads pool, subject and session for the current date. Used after the
    /// midnight reset.
    pub async fn refresh(&self) -> GameResult<GameSnapshot> {
        let mut inner = self.active().await?;
        let date = utc_date(self.clock.now().await);
        inner.pool = None;
        self.load_day(&mut inner, date).await?;
        self.render(&inner).await
    }

    /// Sorted names for guess autocompletion.
    pub async fn candidate_names(&self) -> GameResult<Vec<String>> {
        let inner = self.active().await?;
        Ok(inner
            .pool
            .as_ref()
            .map(SubjectPool::candidate_names)
            .unwrap_or_default())
    }

    pub async fn next_reset_in(&self) -> GameResult<Option<Duration>> {
        self.active().await?;
        Ok(self.scheduler.time_until_reset().await)
    }

    /// Cancels retries and the pending reset. Safe to call more than once.
    pub async fn dispose(&self) {
        // Cancel before locking so an initialize stuck in retries lets go.
        self.cancel.cancel();
        self.scheduler.teardown().await;

        let mut inner = self.inner.lock().await;
        if inner.lifecycle != Lifecycle::Disposed {
            inner.lifecycle = Lifecycle::Disposed;
            log_info!("Game service disposed");
        }
    }

    async fn active(&self) -> GameResult<MutexGuard<'_, ServiceInner>> {
        let inner = self.inner.lock().await;
        if inner.lifecycle != Lifecycle::Active {
            return Err(GameError::NotActive);
        }
        Ok(inner)
    }

    /// Catches a date change that happened before the reset callback was
    /// handled.
    async fn ensure_current_day(&self, inner: &mut ServiceInner) -> GameResult<()> {
        let date = utc_date(self.clock.now().await);
        if let Some(today) = inner.today.as_ref() {
            let session_date = today.session.iso_date;
            if session_date > date {
                log_warn!(
                    "Clock reads {} but the game is for {}; keeping the current game",
                    date,
                    session_date
                );
                return Ok(());
            }
            if session_date == date {
                return Ok(());
            }
        }

        log_info!("Date is now {}; loading a new game", date);
        inner.pool = None;
        self.load_day(inner, date).await
    }

    /// The session decides the day: a clock behind the stored session never
    /// moves the game back.
    async fn load_day(&self, inner: &mut ServiceInner, date: NaiveDate) -> GameResult<()> {
        let session = self.sessions.load_or_start(date).await?;
        let subject = self.resolve_subject(inner, session.iso_date).await?;
        inner.today = Some(Today { subject, session });
        Ok(())
    }

    /// A malformed pick drops the pool and loads it again, within the retry
    /// budget.
    async fn resolve_subject(&self, inner: &mut ServiceInner, date: NaiveDate) -> GameResult<Subject> {
        let mut reloads = 0;
        loop {
            let pool = match inner.pool.take() {
                Some(pool) => pool,
                None => {
                    load_pool(self.pool_source.as_ref(), self.options.retry, &self.cancel).await?
                }
            };

            match self.selector.daily_subject(&pool, date).await {
                Err(GameError::MalformedSubject { index, field })
                    if reloads < self.options.retry.max_retries =>
                {
                    reloads += 1;
                    log_warn!(
                        "Subject #{} is missing {}; reloading pool (attempt {})",
                        index,
                        field,
                        reloads
                    );
                }
                result => {
                    inner.pool = Some(pool);
                    return result;
                }
            }
        }
    }

    async fn render(&self, inner: &ServiceInner) -> GameResult<GameSnapshot> {
        let today = inner.today.as_ref().ok_or_else(no_game_loaded)?;
        let remaining = self.scheduler.time_until_reset().await;
        Ok(build_snapshot(today, &self.options.reveal, remaining))
    }
}

fn no_game_loaded() -> GameError {
    GameError::Internal(anyhow!("no game loaded"))
}

fn build_snapshot(today: &Today, reveal: &RevealPolicy, remaining: Option<Duration>) -> GameSnapshot {
    let session = &today.session;
    let hint = session
        .hint_level
        .checked_sub(1)
        .and_then(|level| hint_for_level(&today.subject, level))
        .map(|hint| hint.to_string());
    let used = session.guesses.len().min(usize::from(MAX_HINT_LEVEL) + 1) as u8;

    GameSnapshot {
        iso_date: session.iso_date,
        game_id: string_hash(&today.subject.display_name),
        image_ref: reveal.image_for(&today.subject, session).to_string(),
        hint_level: session.hint_level,
        hint,
        guesses: session.guesses.clone(),
        guesses_left: if session.is_over {
            0
        } else {
            MAX_HINT_LEVEL + 1 - used
        },
        is_over: session.is_over,
        solved: session.solved(),
        revealed_name: session.revealed_subject_name.clone(),
        next_reset_secs: remaining.map(|d| d.as_secs()),
        countdown: format_countdown(remaining),
    }
}
