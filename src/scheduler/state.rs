use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerStatus {
    /// Constructed, never armed.
    #[default]
    Pending,
    /// A reset is pending for `next_fire_at`.
    Armed,
    /// Torn down. Terminal.
    Idle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub status: SchedulerStatus,
    pub next_fire_at: Option<DateTime<Utc>>,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub fire_count: u64,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, next_fire_at: DateTime<Utc>) {
        if self.status == SchedulerStatus::Idle {
            return;
        }
        self.status = SchedulerStatus::Armed;
        self.next_fire_at = Some(next_fire_at);
    }

    pub fn record_fire(&mut self, fired_at: DateTime<Utc>) {
        self.fire_count = self.fire_count.saturating_add(1);
        self.last_fired_at = Some(fired_at);
    }

    pub fn teardown(&mut self) {
        self.status = SchedulerStatus::Idle;
        self.next_fire_at = None;
    }

    /// Time left until the pending reset, derived from the known fire instant.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.status, self.next_fire_at) {
            (SchedulerStatus::Armed, Some(next)) => Some(crate::clock::duration_until(now, next)),
            _ => None,
        }
    }
}

/// `"{hours}h {minutes}m"`, or `"--h --m"` when nothing is scheduled.
pub fn format_countdown(remaining: Option<Duration>) -> String {
    match remaining {
        Some(remaining) => {
            let secs = remaining.as_secs();
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        }
        None => "--h --m".to_string(),
    }
}
