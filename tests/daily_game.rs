use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;

use daily_flag_lib::clock::Clock;
use daily_flag_lib::db::{Database, KeyValueStore, MemoryStore};
use daily_flag_lib::game::{GameService, ServiceOptions, MSG_CORRECT, MSG_WRONG};
use daily_flag_lib::imaging::ImageObscurer;
use daily_flag_lib::models::SubjectRecord;
use daily_flag_lib::scheduler::ResetCallback;
use daily_flag_lib::selection::{StaticPoolSource, DAILY_CACHE_KEY};
use daily_flag_lib::terminal;
use daily_flag_lib::GameError;

struct WallClock(Mutex<DateTime<Utc>>);

impl WallClock {
    fn at(instant: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(instant)))
    }

    fn set(&self, instant: DateTime<Utc>) {
        *self.0.lock().unwrap() = instant;
    }
}

#[async_trait]
impl Clock for WallClock {
    async fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct Frosted;

#[async_trait]
impl ImageObscurer for Frosted {
    async fn obscure(&self, source_ref: &str) -> Result<String> {
        Ok(format!("frosted:{source_ref}"))
    }
}

fn pool() -> Vec<SubjectRecord> {
    vec![
        SubjectRecord {
            display_name: "Aland".into(),
            source_image_ref: "https://flagcdn.com/w320/ax.png".into(),
            capital: "Mariehamn".into(),
            region: "Europe".into(),
            population: 30_000,
        },
        SubjectRecord {
            display_name: "France".into(),
            source_image_ref: "https://flagcdn.com/w320/fr.png".into(),
            capital: "Paris".into(),
            region: "Europe".into(),
            population: 67_000_000,
        },
    ]
}

fn game(store: Arc<dyn KeyValueStore>, clock: Arc<WallClock>) -> GameService {
    GameService::new(
        ServiceOptions::default(),
        store,
        clock,
        Arc::new(StaticPoolSource::new(pool())),
        Arc::new(Frosted),
    )
}

fn ignore_reset() -> ResetCallback {
    Arc::new(|_| {})
}

fn march_15_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

#[tokio::test]
async fn plays_a_full_day() {
    let store = Arc::new(MemoryStore::new());
    let service = game(store.clone(), WallClock::at(march_15_morning()));

    let start = service.initialize(ignore_reset()).await.unwrap();
    assert_eq!(start.iso_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    assert_eq!(start.image_ref, "frosted:https://flagcdn.com/w320/fr.png");
    assert_eq!(start.countdown, "14h 30m");

    let miss = service.submit_guess("Germany").await.unwrap();
    assert_eq!(miss.message, MSG_WRONG);
    assert_eq!(miss.snapshot.hint_level, 1);
    assert_eq!(miss.snapshot.image_ref, "https://flagcdn.com/w320/fr.png");

    let hit = service.submit_guess("FRANCE").await.unwrap();
    assert_eq!(hit.message, MSG_CORRECT);
    assert!(hit.evaluation.is_terminal);

    let view = terminal::render(&hit.snapshot);
    assert!(view.contains("🟥 Germany"));
    assert!(view.contains("🟩 FRANCE"));
    assert!(view.contains("The answer was France."));

    let again = service.submit_guess("France").await.unwrap_err();
    assert!(matches!(again, GameError::AlreadyCompleted));
    assert_eq!(
        again.user_message(),
        "You've already completed today's game. Come back tomorrow!"
    );

    let cached = store.get(DAILY_CACHE_KEY).await.unwrap().unwrap();
    assert!(cached.contains("\"isoDate\":\"2024-03-15\""));

    service.dispose().await;
}

#[tokio::test]
async fn sqlite_store_keeps_progress_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let clock = WallClock::at(march_15_morning());

    {
        let store = Arc::new(Database::new(dir.path().join("daily-flag.sqlite3")).unwrap());
        let service = game(store, clock.clone());
        service.initialize(ignore_reset()).await.unwrap();
        service.submit_guess("Spain").await.unwrap();
        service.submit_guess("Italy").await.unwrap();
        service.dispose().await;
    }

    let store = Arc::new(Database::new(dir.path().join("daily-flag.sqlite3")).unwrap());
    let service = game(store, clock.clone());
    let restored = service.initialize(ignore_reset()).await.unwrap();
    assert_eq!(restored.hint_level, 2);
    assert_eq!(restored.hint.as_deref(), Some("Population: 67,000,000"));
    assert_eq!(
        restored
            .guesses
            .iter()
            .map(|guess| guess.text.as_str())
            .collect::<Vec<_>>(),
        vec!["Spain", "Italy"]
    );

    // the next day starts clean
    clock.set(Utc.with_ymd_and_hms(2024, 3, 16, 8, 0, 0).unwrap());
    let tomorrow = service.snapshot().await.unwrap();
    assert_eq!(tomorrow.image_ref, "frosted:https://flagcdn.com/w320/ax.png");
    assert_eq!(tomorrow.hint_level, 0);
    assert!(tomorrow.guesses.is_empty());

    service.dispose().await;
}
