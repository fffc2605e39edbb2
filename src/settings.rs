use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::session::{PlaybackSession, SessionConfig};
use crate::stream::{Platform, Quality, ResolveOptions};

const DEBUG_ENV: &str = "SOUNDMASTER_DEBUG";
const DEBUG_HEALTH_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StationSettings {
    pub station_id: String,
    pub platform: Platform,
    pub base_stream_url: String,
    pub default_quality: Quality,
    pub embed_domain: String,
    pub kick_fallback_slug: String,
    pub health_interval_ms: u64,
    pub clock_interval_ms: u64,
    pub load_timeout_ms: Option<u64>,
}

impl Default for StationSettings {
    fn default() -> Self {
        let resolve = ResolveOptions::default();
        Self {
            station_id: "soundmaster".into(),
            platform: Platform::Kick,
            base_stream_url: "https://player.kick.com/soundmasterlive".into(),
            default_quality: Quality::Auto,
            embed_domain: resolve.embed_domain,
            kick_fallback_slug: resolve.kick_fallback_slug,
            health_interval_ms: 2000,
            clock_interval_ms: 1000,
            load_timeout_ms: None,
        }
    }
}

impl StationSettings {
    pub fn session_config(&self) -> SessionConfig {
        let health_interval_ms = if debug_mode() {
            DEBUG_HEALTH_INTERVAL_MS
        } else {
            self.health_interval_ms
        };

        SessionConfig {
            health_interval: Duration::from_millis(health_interval_ms.max(1)),
            clock_interval: Duration::from_millis(self.clock_interval_ms.max(1)),
            load_timeout: self.load_timeout_ms.map(Duration::from_millis),
            resolve: ResolveOptions {
                embed_domain: self.embed_domain.clone(),
                kick_fallback_slug: self.kick_fallback_slug.clone(),
            },
        }
    }

    pub fn playback_session(&self) -> PlaybackSession {
        PlaybackSession::new(self.platform, self.base_stream_url.clone(), self.default_quality)
    }
}

pub fn debug_mode() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StationSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                StationSettings::default()
            })
        } else {
            StationSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn station(&self) -> StationSettings {
        self.read().clone()
    }

    pub fn update_station(&self, settings: StationSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: StationSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &StationSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, StationSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StationSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.station(), StationSettings::default());
    }

    #[test]
    fn updates_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.station();
        settings.platform = Platform::Youtube;
        settings.base_stream_url = "https://www.youtube.com/watch?v=abc123".into();
        settings.default_quality = Quality::P1080;
        settings.load_timeout_ms = Some(20_000);
        store.update_station(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.station(), settings);
        reopened.reload().unwrap();
        assert_eq!(reopened.station(), settings);
    }

    #[test]
    fn partial_and_corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{ "stationId": "night-shift", "defaultQuality": "360p" }"#).unwrap();
        let station = SettingsStore::new(partial).unwrap().station();
        assert_eq!(station.station_id, "night-shift");
        assert_eq!(station.default_quality, Quality::P360);
        assert_eq!(station.health_interval_ms, 2000);

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(
            SettingsStore::new(corrupt).unwrap().station(),
            StationSettings::default()
        );
    }

    #[test]
    fn session_config_maps_intervals_and_resolve_options() {
        let settings = StationSettings {
            embed_domain: "radio.example.com".into(),
            load_timeout_ms: Some(15_000),
            clock_interval_ms: 250,
            ..StationSettings::default()
        };
        let config = settings.session_config();

        assert_eq!(config.clock_interval, Duration::from_millis(250));
        assert_eq!(config.load_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.resolve.embed_domain, "radio.example.com");

        let session = settings.playback_session();
        assert_eq!(session.retry_epoch, 0);
        assert_eq!(session.quality, Quality::Auto);
    }
}
