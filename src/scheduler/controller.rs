use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::{duration_until, next_utc_midnight, utc_date, Clock},
    selection::DailySelector,
};

use super::{SchedulerState, SchedulerStatus};

/// Called after the daily cache is cleared, with the new UTC date.
pub type ResetCallback = Arc<dyn Fn(NaiveDate) + Send + Sync>;

/// Longest single sleep. Bounds how late a reset fires after the host resumes
/// from suspension.
const DEFAULT_MAX_SLEEP: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub state: SchedulerState,
    pub remaining_ms: Option<u64>,
}

/// Fires at every UTC midnight: clears the selector's cache, then notifies.
#[derive(Clone)]
pub struct ResetScheduler {
    state: Arc<Mutex<SchedulerState>>,
    clock: Arc<dyn Clock>,
    selector: Arc<DailySelector>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel: CancellationToken,
    max_sleep: Duration,
}

impl ResetScheduler {
    pub fn new(clock: Arc<dyn Clock>, selector: Arc<DailySelector>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new())),
            clock,
            selector,
            ticker: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            max_sleep: DEFAULT_MAX_SLEEP,
        }
    }

    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = max_sleep.max(Duration::from_millis(1));
        self
    }

    /// Arms the timer for the next UTC midnight. Re-arming replaces the
    /// callback; arming after teardown is an error.
    pub async fn arm(&self, on_reset: ResetCallback) -> Result<DateTime<Utc>> {
        {
            let state = self.state.lock().await;
            if state.status == SchedulerStatus::Idle {
                bail!("reset scheduler was torn down");
            }
        }

        let next = next_utc_midnight(self.clock.now().await);
        self.state.lock().await.arm(next);
        self.spawn_ticker(on_reset).await;

        info!("Reset scheduled for {}", next.to_rfc3339());
        Ok(next)
    }

    pub async fn get_state(&self) -> SchedulerState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> SchedulerSnapshot {
        let now = self.clock.now().await;
        let state = self.state.lock().await.clone();
        SchedulerSnapshot {
            remaining_ms: state.remaining(now).map(|d| d.as_millis() as u64),
            state,
        }
    }

    /// Countdown source for the front end; no second timer involved.
    pub async fn time_until_reset(&self) -> Option<Duration> {
        let now = self.clock.now().await;
        self.state.lock().await.remaining(now)
    }

    /// Cancels the pending reset. The scheduler cannot be armed again.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        self.cancel_ticker().await;
        self.state.lock().await.teardown();
        info!("Reset scheduler torn down");
    }

    async fn spawn_ticker(&self, on_reset: ResetCallback) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let clock = self.clock.clone();
        let selector = self.selector.clone();
        let cancel = self.cancel.clone();
        let max_sleep = self.max_sleep;

        let handle = tokio::spawn(async move {
            loop {
                let target = match state.lock().await.next_fire_at {
                    Some(target) => target,
                    None => break,
                };

                if !wait_until(clock.as_ref(), target, max_sleep, &cancel).await {
                    break;
                }

                // Cache first, so the refresh triggered by the callback recomputes.
                if let Err(err) = selector.invalidate().await {
                    error!("Failed to invalidate daily cache on reset: {err:#}");
                }

                let now = clock.now().await.max(target);
                let next = next_utc_midnight(now);
                {
                    let mut guard = state.lock().await;
                    guard.record_fire(now);
                    guard.arm(next);
                }

                // after a long suspension, report the day we woke up in
                let today = utc_date(now);
                info!(
                    "Daily reset fired for {}; next at {}",
                    today,
                    next.to_rfc3339()
                );
                on_reset(today);
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// Sleeps in bounded slices until the clock reaches `target`. Re-reading the
/// clock each slice catches a target that passed while the host was suspended.
/// Returns `false` when cancelled.
async fn wait_until(
    clock: &dyn Clock,
    target: DateTime<Utc>,
    max_sleep: Duration,
    cancel: &CancellationToken,
) -> bool {
    loop {
        let now = clock.now().await;
        if now >= target {
            return !cancel.is_cancelled();
        }

        let wait = duration_until(now, target).min(max_sleep);
        tokio::select! {
            _ = time::sleep(wait) => {}
            _ = cancel.cancelled() => return false,
        }
    }
}
