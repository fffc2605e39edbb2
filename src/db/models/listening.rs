use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One closed listening interval, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListeningSessionRecord {
    pub id: String,
    pub station_id: String,
    pub duration_seconds: u64,
    pub session_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

impl ListeningSessionRecord {
    pub fn new(
        station_id: impl Into<String>,
        duration_seconds: u64,
        session_date: NaiveDate,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.into(),
            duration_seconds,
            session_date,
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyListeningSummary {
    pub station_id: String,
    pub date: NaiveDate,
    pub sessions: u64,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StationListeners {
    pub station_id: String,
    pub listener_count: u64,
    pub peak_listeners: u64,
    pub updated_at: DateTime<Utc>,
}
