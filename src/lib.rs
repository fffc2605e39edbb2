pub mod analytics;
pub mod db;
pub mod error;
pub mod health;
pub mod notify;
pub mod session;
pub mod settings;
pub mod stream;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};

use analytics::StationAnalytics;
use db::Database;
use health::RandomHealthSource;
use notify::{BroadcastNotifier, FanoutNotifier, LogNotifier, Notifier};
use session::LiveSessionController;
use settings::SettingsStore;

pub use error::{StreamError, StreamResult};
pub use session::{EmbedTarget, SessionConfig, SessionSnapshot, SessionState};
pub use stream::{Platform, Quality, ResolvedStream};

const DATA_DIR_ENV: &str = "SOUNDMASTER_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "soundmaster-data";

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("SoundMaster live starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(serve()) {
        error!("SoundMaster live stopped: {err:#}");
        std::process::exit(1);
    }
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Runs one headless listening session until ctrl-c.
async fn serve() -> Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let station = settings.station();

    let database = Database::new(data_dir.join("soundmaster.sqlite3"))?;

    // A crashed process never sent its -1, so the stored count is stale.
    let stale = database
        .reset_listener_count(&station.station_id, Utc::now())
        .await?;
    if stale > 0 {
        warn!(
            "Reset {} stale listener(s) for station {}",
            stale, station.station_id
        );
    }

    let collaborators = Arc::new(StationAnalytics::new(
        database.clone(),
        station.station_id.clone(),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(vec![
        Arc::new(LogNotifier) as Arc<dyn Notifier>,
        Arc::new(BroadcastNotifier::new()) as Arc<dyn Notifier>,
    ]));

    let controller = LiveSessionController::new(
        station.session_config(),
        station.playback_session(),
        notifier,
        collaborators.clone(),
        collaborators,
    );

    let target = controller
        .mount(Box::new(RandomHealthSource::new()))
        .await?;
    info!("Embedding {} (key {})", target.url, target.key);
    let stream = controller.stream().await;
    if stream.chat_available() {
        info!("Chat available at {}", stream.chat_url);
    }

    // No embed surface here, so the player counts as loaded once mounted.
    controller.on_load_success().await?;
    controller.set_playing(true).await?;

    let mut health = controller.subscribe_health();
    let monitor = tokio::spawn(async move {
        while health.changed().await.is_ok() {
            let snapshot = health.borrow_and_update().clone();
            if let Some(sample) = snapshot.sample {
                debug!(
                    "health: {} kbps, {} fps, {} ms, buffering={}, viewers={}",
                    sample.bitrate_kbps,
                    sample.fps,
                    sample.latency_ms,
                    sample.buffering,
                    snapshot.stats.view_count
                );
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down listening session");

    controller.teardown().await?;
    monitor.abort();

    let summary = database
        .daily_listening_summary(&station.station_id, Utc::now().date_naive())
        .await?;
    info!(
        "Station {} today: {} session(s), {} second(s) listened",
        summary.station_id, summary.sessions, summary.total_seconds
    );

    Ok(())
}
