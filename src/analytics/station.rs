use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::db::{Database, ListeningSessionRecord};

use super::{AnalyticsStore, ListenerCounter};

/// SQLite-backed collaborators scoped to one station.
#[derive(Clone)]
pub struct StationAnalytics {
    db: Database,
    station_id: String,
}

impl StationAnalytics {
    pub fn new(db: Database, station_id: impl Into<String>) -> Self {
        Self {
            db,
            station_id: station_id.into(),
        }
    }
}

#[async_trait]
impl ListenerCounter for StationAnalytics {
    async fn increment(&self, delta: i64) -> Result<()> {
        self.db
            .increment_listener_count(&self.station_id, delta, Utc::now())
            .await
            .with_context(|| format!("failed to update listeners for {}", self.station_id))?;
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for StationAnalytics {
    async fn record_session(&self, duration_seconds: u64, date: NaiveDate) -> Result<()> {
        let record = ListeningSessionRecord::new(&self.station_id, duration_seconds, date, Utc::now());
        self.db
            .insert_listening_session(&record)
            .await
            .context("failed to store listening session")
    }
}
