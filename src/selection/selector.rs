use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use tokio::sync::Mutex;

use crate::db::KeyValueStore;
use crate::error::{GameError, GameResult};
use crate::imaging::{obscure_or_source, ImageObscurer};
use crate::models::{DailyCacheEntry, Subject, SubjectPool};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Store key of the persisted daily selection.
pub const DAILY_CACHE_KEY: &str = "daily_country_cache";

/// The date's digits read as one integer: 2024-03-15 -> 20240315.
pub fn date_key(date: NaiveDate) -> u64 {
    let year = date.year().max(0) as u64;
    year * 10_000 + date.month() as u64 * 100 + date.day() as u64
}

/// Pool position for `key`; `None` only for an empty pool.
pub fn select_index(key: u64, pool_len: usize) -> Option<usize> {
    if pool_len == 0 {
        return None;
    }
    Some((key % pool_len as u64) as usize)
}

/// Picks the subject of the day and keeps it for the rest of that day.
///
/// The pick is a pure function of pool and date, so independent clients agree
/// on it. The obscured image is computed once per day and persisted with the
/// date in a single record.
pub struct DailySelector {
    store: Arc<dyn KeyValueStore>,
    obscurer: Arc<dyn ImageObscurer>,
    current: Mutex<Option<DailyCacheEntry>>,
}

impl DailySelector {
    pub fn new(store: Arc<dyn KeyValueStore>, obscurer: Arc<dyn ImageObscurer>) -> Self {
        Self {
            store,
            obscurer,
            current: Mutex::new(None),
        }
    }

    pub async fn daily_subject(&self, pool: &SubjectPool, date: NaiveDate) -> GameResult<Subject> {
        let mut current = self.current.lock().await;

        if let Some(entry) = current.as_ref().filter(|entry| entry.is_valid_for(date)) {
            return Ok(entry.subject.clone());
        }

        if let Some(entry) = self.load_cached(date).await {
            log_info!("Using cached subject for {}", entry.iso_date);
            let subject = entry.subject.clone();
            *current = Some(entry);
            return Ok(subject);
        }

        let index = select_index(date_key(date), pool.len())
            .ok_or_else(|| GameError::PoolUnavailable("subject pool is empty".into()))?;
        let record = pool
            .get(index)
            .cloned()
            .ok_or_else(|| GameError::PoolUnavailable(format!("no subject at index {index}")))?;
        if let Some(field) = record.missing_field() {
            return Err(GameError::MalformedSubject { index, field });
        }

        log_info!(
            "Selected subject #{} of {} for {}",
            index,
            pool.len(),
            date
        );

        let obscured = obscure_or_source(self.obscurer.as_ref(), &record.source_image_ref).await;
        let entry = DailyCacheEntry {
            iso_date: date,
            subject: Subject::from_record(record, obscured),
        };

        if let Err(err) = self.persist(&entry).await {
            log_warn!("Failed to save daily cache: {err:#}");
        }

        let subject = entry.subject.clone();
        *current = Some(entry);
        Ok(subject)
    }

    /// Drops the in-memory and persisted selection so the next call recomputes.
    pub async fn invalidate(&self) -> Result<()> {
        *self.current.lock().await = None;
        self.store
            .remove(DAILY_CACHE_KEY)
            .await
            .context("failed to clear daily cache")?;
        log_debug!("Daily cache invalidated");
        Ok(())
    }

    pub async fn current_entry(&self) -> Option<DailyCacheEntry> {
        self.current.lock().await.clone()
    }

    async fn load_cached(&self, date: NaiveDate) -> Option<DailyCacheEntry> {
        let raw = match self.store.get(DAILY_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log_warn!("Failed to load daily cache: {err:#}");
                return None;
            }
        };

        match serde_json::from_str::<DailyCacheEntry>(&raw) {
            Ok(entry) if entry.is_valid_for(date) => Some(entry),
            Ok(entry) => {
                log_debug!("Evicting daily cache for {}", entry.iso_date);
                self.evict().await;
                None
            }
            Err(err) => {
                log_warn!("Discarding unreadable daily cache: {err}");
                self.evict().await;
                None
            }
        }
    }

    async fn persist(&self, entry: &DailyCacheEntry) -> Result<()> {
        let serialized = serde_json::to_string(entry)?;
        self.store.set(DAILY_CACHE_KEY, &serialized).await
    }

    async fn evict(&self) {
        if let Err(err) = self.store.remove(DAILY_CACHE_KEY).await {
            log_warn!("Failed to evict daily cache: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::SubjectRecord;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TaggingObscurer {
        calls: AtomicU32,
        fail: bool,
    }

    impl TaggingObscurer {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ImageObscurer for TaggingObscurer {
        async fn obscure(&self, source_ref: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("decode failed"))
            } else {
                Ok(format!("blurred:{source_ref}"))
            }
        }
    }

    fn record(name: &str, population: u64) -> SubjectRecord {
        SubjectRecord {
            display_name: name.into(),
            source_image_ref: format!("{}.png", name.to_lowercase()),
            capital: "Capital".into(),
            region: "Europe".into(),
            population,
        }
    }

    fn pool() -> SubjectPool {
        SubjectPool::new(vec![record("Aland", 30_000), record("France", 67_000_000)]).unwrap()
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn date_key_concatenates_digits() {
        assert_eq!(date_key(march(15)), 20240315);
        assert_eq!(date_key(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()), 20250102);
    }

    #[test]
    fn index_is_always_in_range() {
        for len in 1..50usize {
            for key in [0u64, 1, 20240315, u64::MAX, u64::MAX - 7] {
                let index = select_index(key, len).unwrap();
                assert!(index < len);
            }
        }
        assert_eq!(select_index(20240315, 0), None);
    }

    #[tokio::test]
    async fn picks_date_key_mod_pool_len() {
        let store = Arc::new(MemoryStore::new());
        let selector = DailySelector::new(store, Arc::new(TaggingObscurer::new(false)));

        let subject = selector.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(subject.display_name, "France");
        assert_eq!(subject.obscured_image_ref, "blurred:france.png");
    }

    #[tokio::test]
    async fn same_day_is_stable_and_blurs_once() {
        let store = Arc::new(MemoryStore::new());
        let obscurer = Arc::new(TaggingObscurer::new(false));
        let selector = DailySelector::new(store.clone(), obscurer.clone());

        let first = selector.daily_subject(&pool(), march(15)).await.unwrap();
        let second = selector.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(obscurer.calls.load(Ordering::SeqCst), 1);

        // a fresh selector over the same store reuses the persisted record
        let restarted = DailySelector::new(store, obscurer.clone());
        let third = restarted.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(third, first);
        assert_eq!(obscurer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_day_replaces_cache_record() {
        let store = Arc::new(MemoryStore::new());
        let selector = DailySelector::new(store.clone(), Arc::new(TaggingObscurer::new(false)));

        selector.daily_subject(&pool(), march(15)).await.unwrap();
        let next = selector.daily_subject(&pool(), march(16)).await.unwrap();
        assert_eq!(next.display_name, "Aland");

        let raw = store.get(DAILY_CACHE_KEY).await.unwrap().unwrap();
        let entry: DailyCacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.iso_date, march(16));
        assert_eq!(entry.subject, next);
    }

    #[tokio::test]
    async fn stale_persisted_entry_is_evicted() {
        let store = Arc::new(MemoryStore::new());
        let stale = DailyCacheEntry {
            iso_date: march(14),
            subject: Subject::from_record(record("Aland", 1), "old".into()),
        };
        store
            .set(DAILY_CACHE_KEY, &serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();

        let selector = DailySelector::new(store.clone(), Arc::new(TaggingObscurer::new(false)));
        let subject = selector.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(subject.display_name, "France");
        assert_eq!(selector.current_entry().await.unwrap().iso_date, march(15));
    }

    #[tokio::test]
    async fn blur_failure_falls_back_to_source_image() {
        let selector = DailySelector::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TaggingObscurer::new(true)),
        );
        let subject = selector.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(subject.obscured_image_ref, subject.source_image_ref);
        assert!(!subject.is_obscured());
    }

    #[tokio::test]
    async fn malformed_record_is_a_hard_failure() {
        let mut broken = record("France", 1);
        broken.source_image_ref.clear();
        let pool = SubjectPool::new(vec![record("Aland", 1), broken]).unwrap();
        let selector = DailySelector::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TaggingObscurer::new(false)),
        );

        let err = selector.daily_subject(&pool, march(15)).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::MalformedSubject {
                index: 1,
                field: "sourceImageRef"
            }
        ));
    }

    #[tokio::test]
    async fn invalidate_clears_memory_and_store() {
        let store = Arc::new(MemoryStore::new());
        let obscurer = Arc::new(TaggingObscurer::new(false));
        let selector = DailySelector::new(store.clone(), obscurer.clone());

        selector.daily_subject(&pool(), march(15)).await.unwrap();
        selector.invalidate().await.unwrap();

        assert!(store.get(DAILY_CACHE_KEY).await.unwrap().is_none());
        assert!(selector.current_entry().await.is_none());

        selector.daily_subject(&pool(), march(15)).await.unwrap();
        assert_eq!(obscurer.calls.load(Ordering::SeqCst), 2);
    }
}
