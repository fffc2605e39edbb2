use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_date, parse_date, parse_datetime, to_i64, to_u64},
    models::{DailyListeningSummary, ListeningSessionRecord},
};

fn row_to_listening_session(row: &Row) -> Result<ListeningSessionRecord> {
    let duration_seconds: i64 = row.get("duration_seconds")?;
    let session_date: String = row.get("session_date")?;
    let recorded_at: String = row.get("recorded_at")?;

    Ok(ListeningSessionRecord {
        id: row.get("id")?,
        station_id: row.get("station_id")?,
        duration_seconds: to_u64(duration_seconds, "duration_seconds")?,
        session_date: parse_date(&session_date, "session_date")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

impl Database {
    pub async fn insert_listening_session(&self, record: &ListeningSessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO listening_sessions (id, station_id, duration_seconds, session_date, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.station_id,
                    to_i64(record.duration_seconds)?,
                    format_date(record.session_date),
                    record.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Most recent first.
    pub async fn list_listening_sessions(
        &self,
        station_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ListeningSessionRecord>> {
        let station_id = station_id.to_string();
        let limit = limit as i64;
        let offset = offset as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, station_id, duration_seconds, session_date, recorded_at
                 FROM listening_sessions
                 WHERE station_id = ?1
                 ORDER BY recorded_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let mut rows = stmt.query(params![station_id, limit, offset])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_listening_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn daily_listening_summary(
        &self,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<DailyListeningSummary> {
        let station_id = station_id.to_string();
        self.execute(move |conn| {
            let (sessions, total_seconds): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(duration_seconds), 0)
                 FROM listening_sessions
                 WHERE station_id = ?1 AND session_date = ?2",
                params![station_id, format_date(date)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(DailyListeningSummary {
                station_id,
                date,
                sessions: to_u64(sessions, "sessions")?,
                total_seconds: to_u64(total_seconds, "total_seconds")?,
            })
        })
        .await
    }
}
