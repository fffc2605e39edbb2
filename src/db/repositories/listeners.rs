use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u64},
    models::StationListeners,
};

fn row_to_station_listeners(row: &Row) -> Result<StationListeners> {
    let listener_count: i64 = row.get("listener_count")?;
    let peak_listeners: i64 = row.get("peak_listeners")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(StationListeners {
        station_id: row.get("station_id")?,
        listener_count: to_u64(listener_count, "listener_count")?,
        peak_listeners: to_u64(peak_listeners, "peak_listeners")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Applies `delta` in a single upsert and returns the new count, which
    /// never drops below zero.
    pub async fn increment_listener_count(
        &self,
        station_id: &str,
        delta: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let station_id = station_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO station_listeners (station_id, listener_count, peak_listeners, updated_at)
                 VALUES (?1, MAX(?2, 0), MAX(?2, 0), ?3)
                 ON CONFLICT(station_id) DO UPDATE SET
                     listener_count = MAX(station_listeners.listener_count + ?2, 0),
                     peak_listeners = MAX(station_listeners.peak_listeners, station_listeners.listener_count + ?2),
                     updated_at = ?3",
                params![station_id, delta, updated_at.to_rfc3339()],
            )?;

            let count: i64 = conn.query_row(
                "SELECT listener_count FROM station_listeners WHERE station_id = ?1",
                params![station_id],
                |row| row.get(0),
            )?;
            to_u64(count, "listener_count")
        })
        .await
    }

    pub async fn get_station_listeners(&self, station_id: &str) -> Result<Option<StationListeners>> {
        let station_id = station_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT station_id, listener_count, peak_listeners, updated_at
                 FROM station_listeners
                 WHERE station_id = ?1",
            )?;

            let mut rows = stmt.query(params![station_id])?;
            let listeners = match rows.next()? {
                Some(row) => Some(row_to_station_listeners(row)?),
                None => None,
            };
            Ok(listeners)
        })
        .await
    }

    pub async fn listener_count(&self, station_id: &str) -> Result<u64> {
        let station_id = station_id.to_string();
        self.execute(move |conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT listener_count FROM station_listeners WHERE station_id = ?1",
                    params![station_id],
                    |row| row.get(0),
                )
                .optional()?;
            to_u64(count.unwrap_or(0), "listener_count")
        })
        .await
    }

    /// Zeroes the live count while keeping the recorded peak.
    pub async fn reset_listener_count(
        &self,
        station_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let station_id = station_id.to_string();
        self.execute(move |conn| {
            let previous: Option<i64> = conn
                .query_row(
                    "SELECT listener_count FROM station_listeners WHERE station_id = ?1",
                    params![station_id],
                    |row| row.get(0),
                )
                .optional()?;

            conn.execute(
                "UPDATE station_listeners
                 SET listener_count = 0,
                     updated_at = ?1
                 WHERE station_id = ?2",
                params![updated_at.to_rfc3339(), station_id],
            )?;

            to_u64(previous.unwrap_or(0), "listener_count")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("listeners.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn deltas_accumulate_and_track_peak() {
        let (_dir, db) = open();
        let now = Utc::now();

        assert_eq!(db.increment_listener_count("soundmaster", 1, now).await.unwrap(), 1);
        assert_eq!(db.increment_listener_count("soundmaster", 1, now).await.unwrap(), 2);
        assert_eq!(db.increment_listener_count("soundmaster", 1, now).await.unwrap(), 3);
        assert_eq!(db.increment_listener_count("soundmaster", -1, now).await.unwrap(), 2);

        let listeners = db.get_station_listeners("soundmaster").await.unwrap().unwrap();
        assert_eq!(listeners.listener_count, 2);
        assert_eq!(listeners.peak_listeners, 3);
    }

    #[tokio::test]
    async fn count_never_goes_negative() {
        let (_dir, db) = open();
        let now = Utc::now();

        assert_eq!(db.increment_listener_count("soundmaster", -1, now).await.unwrap(), 0);
        db.increment_listener_count("soundmaster", 1, now).await.unwrap();
        assert_eq!(db.increment_listener_count("soundmaster", -5, now).await.unwrap(), 0);
        assert_eq!(db.listener_count("soundmaster").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_station_reads_as_zero() {
        let (_dir, db) = open();
        assert_eq!(db.listener_count("nowhere").await.unwrap(), 0);
        assert!(db.get_station_listeners("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_keeps_peak() {
        let (_dir, db) = open();
        let now = Utc::now();
        db.increment_listener_count("soundmaster", 4, now).await.unwrap();

        assert_eq!(db.reset_listener_count("soundmaster", now).await.unwrap(), 4);
        let listeners = db.get_station_listeners("soundmaster").await.unwrap().unwrap();
        assert_eq!(listeners.listener_count, 0);
        assert_eq!(listeners.peak_listeners, 4);
    }

    #[tokio::test]
    async fn concurrent_deltas_are_not_lost() {
        let (_dir, db) = open();
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                db.increment_listener_count("soundmaster", 1, Utc::now()).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(db.listener_count("soundmaster").await.unwrap(), 20);
    }
}
