pub mod clock;
pub mod db;
pub mod error;
pub mod game;
pub mod imaging;
pub mod models;
pub mod scheduler;
pub mod selection;
pub mod settings;
pub mod terminal;
pub mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use clock::{Clock, HttpTimeSource, RemoteClock, SystemClock};
use db::{Database, KeyValueStore, MemoryStore};
use game::{GameService, GameSnapshot};
use imaging::BlurObscurer;
use scheduler::ResetCallback;
use selection::{FilePoolSource, PoolSource, RestCountriesSource};
use settings::{GameSettings, SettingsStore};
use terminal::Command;

pub use error::{GameError, GameResult};

const DB_FILE: &str = "daily-flag.sqlite3";

/// Daily flag guessing game in the terminal
#[derive(Parser, Debug, Default, Clone, Copy)]
#[command(name = "daily-flag")]
#[command(author, version, about, long_about = None)]
pub struct RunOptions {
    /// Keep all state in memory; nothing is written to the data directory
    #[arg(long)]
    pub ephemeral: bool,
}

pub fn run() -> anyhow::Result<()> {
    let options = RunOptions::parse();
    utils::logging::init_logging(settings::debug_enabled());
    info!("Daily Flag starting up...");

    let data_dir = settings::data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let settings_store = SettingsStore::in_dir(&data_dir)?;
    if !options.ephemeral && !settings_store.path().exists() {
        if let Err(err) = settings_store.save() {
            warn!("Failed to write default settings: {err:#}");
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let result = runtime.block_on(play(settings_store.get(), data_dir, options));
    // stdin may still hold a blocking read
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn play(settings: GameSettings, data_dir: PathBuf, options: RunOptions) -> anyhow::Result<()> {
    let store: Arc<dyn KeyValueStore> = if options.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Database::new(data_dir.join(DB_FILE))?)
    };

    let client = reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let clock: Arc<dyn Clock> = if settings.use_remote_clock {
        Arc::new(RemoteClock::new(
            Arc::new(HttpTimeSource::new(client.clone(), &settings.time_api_url)),
            Arc::new(SystemClock),
            settings.time_cache_window(),
        ))
    } else {
        Arc::new(SystemClock)
    };

    let pool_source: Arc<dyn PoolSource> = match &settings.pool_file {
        Some(path) => Arc::new(FilePoolSource::new(path.clone())),
        None => Arc::new(RestCountriesSource::new(
            client.clone(),
            &settings.pool_url,
            settings.min_population,
        )),
    };

    let service = GameService::new(
        settings.service_options(),
        store,
        clock,
        pool_source,
        Arc::new(BlurObscurer::new(client, settings.blur_radius)),
    );

    let (reset_tx, mut reset_rx) = mpsc::unbounded_channel();
    let on_reset: ResetCallback = Arc::new(move |date| {
        let _ = reset_tx.send(date);
    });

    let snapshot = match service.initialize(on_reset).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!("Failed to start game: {err}");
            println!("{}", err.user_message());
            service.dispose().await;
            return Err(err.into());
        }
    };
    show(&snapshot);
    println!("{}", terminal::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                if !handle_line(&service, &line).await {
                    break;
                }
            }
            Some(date) = reset_rx.recv() => {
                info!("New flag for {date}");
                match service.refresh().await {
                    Ok(snapshot) => show(&snapshot),
                    Err(err) => {
                        warn!("Refresh after reset failed: {err}");
                        println!("{}", err.user_message());
                    }
                }
            }
        }
    }

    service.dispose().await;
    Ok(())
}

/// Returns `false` when the player asked to quit.
async fn handle_line(service: &GameService, line: &str) -> bool {
    match Command::parse(line) {
        Command::Quit => return false,
        Command::Help => println!("{}", terminal::HELP),
        Command::Show => match service.snapshot().await {
            Ok(snapshot) => show(&snapshot),
            Err(err) => println!("{}", err.user_message()),
        },
        Command::Names => match service.candidate_names().await {
            Ok(names) => println!("{}", names.join(", ")),
            Err(err) => println!("{}", err.user_message()),
        },
        Command::Guess(guess) => match service.submit_guess(guess).await {
            Ok(outcome) => {
                println!("{}", outcome.message);
                show(&outcome.snapshot);
            }
            Err(err) => {
                if let GameError::Internal(inner) = &err {
                    error!("Guess failed: {inner:#}");
                }
                println!("{}", err.user_message());
            }
        },
    }
    true
}

fn show(snapshot: &GameSnapshot) {
    print!("{}", terminal::render(snapshot));
}
