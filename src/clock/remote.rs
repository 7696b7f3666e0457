use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::Clock;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Authoritative UTC time, usually over HTTP.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn fetch_utc(&self) -> Result<DateTime<Utc>>;
}

/// Queries a JSON time API such as
/// `https://timeapi.io/api/Time/current/zone?timeZone=UTC`.
#[derive(Clone)]
pub struct HttpTimeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTimeSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn fetch_utc(&self) -> Result<DateTime<Utc>> {
        let body: Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("failed to fetch UTC time")?
            .error_for_status()
            .context("time API returned an error status")?
            .json()
            .await
            .context("time API returned invalid JSON")?;

        let raw = ["dateTime", "utc_datetime", "datetime"]
            .iter()
            .find_map(|field| body.get(field).and_then(Value::as_str))
            .ok_or_else(|| anyhow!("time API response has no timestamp field"))?;

        parse_remote_timestamp(raw)
    }
}

/// Accepts RFC 3339 as well as the zone-less ISO form that time APIs return
/// for UTC (`2024-03-15T10:20:30.1234567`).
pub fn parse_remote_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("unrecognized timestamp '{raw}'"))
}

struct CachedInstant {
    instant: DateTime<Utc>,
    fetched_at: Instant,
}

#[derive(Default)]
struct RemoteState {
    last_fetch: Option<CachedInstant>,
    last_failure: Option<Instant>,
}

/// Remote time with a short reuse window and a local fallback.
///
/// A fetch younger than `cache_window` is reused as `cached + elapsed`. If the
/// remote source fails, the fallback clock answers and a warning is logged;
/// the remote source is not asked again until `cache_window` has passed.
pub struct RemoteClock {
    source: Arc<dyn TimeSource>,
    fallback: Arc<dyn Clock>,
    cache_window: Duration,
    state: Mutex<RemoteState>,
}

impl RemoteClock {
    pub fn new(source: Arc<dyn TimeSource>, fallback: Arc<dyn Clock>, cache_window: Duration) -> Self {
        Self {
            source,
            fallback,
            cache_window,
            state: Mutex::new(RemoteState::default()),
        }
    }
}

#[async_trait]
impl Clock for RemoteClock {
    async fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.last_fetch.as_ref() {
            let elapsed = cached.fetched_at.elapsed();
            if elapsed < self.cache_window {
                if let Ok(delta) = ChronoDuration::from_std(elapsed) {
                    return cached.instant + delta;
                }
            }
        }

        if state
            .last_failure
            .is_some_and(|failed_at| failed_at.elapsed() < self.cache_window)
        {
            return self.fallback.now().await;
        }

        match self.source.fetch_utc().await {
            Ok(instant) => {
                log_debug!("Fetched remote UTC time {}", instant.to_rfc3339());
                state.last_fetch = Some(CachedInstant {
                    instant,
                    fetched_at: Instant::now(),
                });
                state.last_failure = None;
                instant
            }
            Err(err) => {
                log_warn!("Failed to fetch UTC time, falling back to local UTC: {err:#}");
                state.last_failure = Some(Instant::now());
                self.fallback.now().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::FixedClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        instant: DateTime<Utc>,
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl TimeSource for CountingSource {
        async fn fetch_utc(&self) -> Result<DateTime<Utc>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("offline"))
            } else {
                Ok(self.instant)
            }
        }
    }

    fn remote_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_fetch_within_window() {
        let source = Arc::new(CountingSource {
            instant: remote_instant(),
            calls: AtomicU32::new(0),
            fail: false,
        });
        let local = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
        let clock = RemoteClock::new(source.clone(), local, Duration::from_secs(60));

        assert_eq!(clock.now().await, remote_instant());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(
            clock.now().await,
            remote_instant() + ChronoDuration::seconds(30)
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(clock.now().await, remote_instant());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_local_clock() {
        let source = Arc::new(CountingSource {
            instant: remote_instant(),
            calls: AtomicU32::new(0),
            fail: true,
        });
        let local_now = Utc.with_ymd_and_hms(2024, 3, 15, 23, 0, 0).unwrap();
        let clock = RemoteClock::new(
            source.clone(),
            Arc::new(FixedClock::at(local_now)),
            Duration::from_secs(60),
        );

        assert_eq!(clock.now().await, local_now);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // inside the window the failure is remembered
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(clock.now().await, local_now);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(clock.now().await, local_now);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_time_api_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 20, 30).unwrap();
        assert_eq!(parse_remote_timestamp("2024-03-15T10:20:30Z").unwrap(), expected);
        assert_eq!(parse_remote_timestamp("2024-03-15T10:20:30").unwrap(), expected);
        assert_eq!(
            parse_remote_timestamp("2024-03-15T10:20:30.1234567")
                .unwrap()
                .timestamp(),
            expected.timestamp()
        );
        assert!(parse_remote_timestamp("yesterday").is_err());
    }
}
