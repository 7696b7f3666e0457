use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::game::{RevealPolicy, ServiceOptions};
use crate::utils::RetryPolicy;

pub const DATA_DIR_ENV: &str = "DAILY_FLAG_DATA_DIR";
pub const DEBUG_ENV: &str = "DAILY_FLAG_DEBUG";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    pub pool_url: String,
    /// Local JSON record list used instead of `pool_url` when set.
    pub pool_file: Option<PathBuf>,
    pub time_api_url: String,
    pub use_remote_clock: bool,
    pub min_population: u64,
    pub blur_radius: u32,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub time_cache_secs: u64,
    pub http_timeout_secs: u64,
    pub reveal: RevealPolicy,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            pool_url: "https://restcountries.com/v3.1/all?fields=name,flags,capital,region,population,cca2"
                .into(),
            pool_file: None,
            time_api_url: "https://timeapi.io/api/Time/current/zone?timeZone=UTC".into(),
            use_remote_clock: true,
            min_population: 500_000,
            blur_radius: 100,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            time_cache_secs: 60,
            http_timeout_secs: 10,
            reveal: RevealPolicy::default(),
        }
    }
}

impl GameSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            retry: self.retry_policy(),
            reveal: self.reveal,
        }
    }

    pub fn time_cache_window(&self) -> Duration {
        Duration::from_secs(self.time_cache_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

/// `DAILY_FLAG_DATA_DIR`, else the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("daily-flag"))
        .ok_or_else(|| anyhow!("no data directory; set {DATA_DIR_ENV}"))
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Settings backed by `settings.json`. A missing or unreadable file yields
/// defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<GameSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            GameSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> GameSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: GameSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = settings;
        self.persist(&guard)
    }

    /// Writes the current values, creating the file on first run.
    pub fn save(&self) -> Result<()> {
        self.persist(&self.get())
    }

    fn persist(&self, data: &GameSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
