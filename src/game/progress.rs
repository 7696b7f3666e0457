use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::clock::iso_date;
use crate::db::KeyValueStore;
use crate::models::GameSession;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const SESSION_KEY: &str = "game_session";

const COMPLETED: &str = "completed";

/// Key of the per-date completion marker, e.g. `game_status_2024-03-15`.
pub fn completed_key(date: NaiveDate) -> String {
    format!("game_status_{}", iso_date(date))
}

/// Persists the player's session and the completion marker.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored session, whatever its date. Unreadable records are dropped.
    pub async fn load(&self) -> Result<Option<GameSession>> {
        let Some(raw) = self.store.get(SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<GameSession>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                log_warn!("Discarding unreadable game session: {err}");
                self.store.remove(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Today's session, or a fresh one. A session from an earlier day is
    /// discarded together with that day's completion marker. A session dated
    /// after `date` is kept: the clock is behind, the day has not changed.
    pub async fn load_or_start(&self, date: NaiveDate) -> Result<GameSession> {
        if let Some(session) = self.load().await? {
            if session.iso_date > date {
                log_warn!(
                    "Clock date {} is before the stored session for {}; keeping it",
                    date,
                    session.iso_date
                );
                return Ok(session);
            }
            if session.is_for(date) {
                log_debug!(
                    "Restored session for {} with {} guesses",
                    date,
                    session.guesses.len()
                );
                return Ok(session);
            }

            log_debug!("Clearing session from {}", session.iso_date);
            self.store
                .remove(&completed_key(session.iso_date))
                .await
                .context("failed to clear previous completion marker")?;
        }

        let session = GameSession::new(date);
        self.save(&session).await?;
        Ok(session)
    }

    pub async fn save(&self, session: &GameSession) -> Result<()> {
        let serialized = serde_json::to_string(session)?;
        self.store
            .set(SESSION_KEY, &serialized)
            .await
            .context("failed to save game session")
    }

    pub async fn mark_completed(&self, date: NaiveDate) -> Result<()> {
        self.store
            .set(&completed_key(date), COMPLETED)
            .await
            .context("failed to save completion marker")
    }

    pub async fn is_completed(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.store.get(&completed_key(date)).await?.as_deref() == Some(COMPLETED))
    }
}
