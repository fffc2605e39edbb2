use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

use super::{AnalyticsStore, ListenerCounter};

/// One continuous span of active playback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListeningInterval {
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningEvent {
    Joined,
    Left { duration_seconds: u64 },
}

/// Turns play/pause edges into listener-count deltas and session durations.
///
/// Collaborator failures are logged and dropped: the in-memory interval
/// bookkeeping never depends on whether a write succeeded, and nothing is
/// retried.
pub struct ListeningAnalyticsReporter {
    is_playing: bool,
    interval: Option<ListeningInterval>,
    listeners: Arc<dyn ListenerCounter>,
    analytics: Arc<dyn AnalyticsStore>,
}

impl ListeningAnalyticsReporter {
    pub fn new(listeners: Arc<dyn ListenerCounter>, analytics: Arc<dyn AnalyticsStore>) -> Self {
        Self {
            is_playing: false,
            interval: None,
            listeners,
            analytics,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn open_interval(&self) -> Option<ListeningInterval> {
        self.interval
    }

    pub async fn set_playing(&mut self, playing: bool) -> Option<ListeningEvent> {
        self.set_playing_at(playing, Utc::now()).await
    }

    pub async fn set_playing_at(
        &mut self,
        playing: bool,
        now: DateTime<Utc>,
    ) -> Option<ListeningEvent> {
        let was_playing = std::mem::replace(&mut self.is_playing, playing);
        match (was_playing, playing) {
            (false, true) => self.open(now).await,
            (true, false) => self.close_at(now).await,
            _ => None,
        }
    }

    /// Closes any open interval as if playback had stopped. Used on teardown.
    pub async fn close_at(&mut self, now: DateTime<Utc>) -> Option<ListeningEvent> {
        self.is_playing = false;
        let interval = self.interval.take()?;

        let duration_seconds = (now - interval.started_at).num_seconds().max(0) as u64;
        if let Err(err) = self
            .analytics
            .record_session(duration_seconds, now.date_naive())
            .await
        {
            error!("{}", StreamError::Collaborator(err.context("record listening session")));
        }
        self.report_delta(-1).await;

        info!("Listener left after {duration_seconds}s");
        Some(ListeningEvent::Left { duration_seconds })
    }

    async fn open(&mut self, now: DateTime<Utc>) -> Option<ListeningEvent> {
        if self.interval.is_some() {
            return None;
        }
        self.interval = Some(ListeningInterval { started_at: now });
        self.report_delta(1).await;
        info!("Listener joined");
        Some(ListeningEvent::Joined)
    }

    async fn report_delta(&self, delta: i64) {
        if let Err(err) = self.listeners.increment(delta).await {
            error!(
                "{}",
                StreamError::Collaborator(err.context(format!("listener count delta {delta}")))
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::super::{AnalyticsStore, ListenerCounter};

    #[derive(Default)]
    pub struct RecordingCollaborators {
        pub deltas: Mutex<Vec<i64>>,
        pub sessions: Mutex<Vec<(u64, NaiveDate)>>,
        pub fail: bool,
    }

    impl RecordingCollaborators {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn net_delta(&self) -> i64 {
            self.deltas.lock().unwrap().iter().sum()
        }

        pub fn session_count(&self) -> usize {
            self.sessions.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ListenerCounter for RecordingCollaborators {
        async fn increment(&self, delta: i64) -> Result<()> {
            self.deltas.lock().unwrap().push(delta);
            if self.fail {
                bail!("listener counter unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AnalyticsStore for RecordingCollaborators {
        async fn record_session(&self, duration_seconds: u64, date: NaiveDate) -> Result<()> {
            self.sessions.lock().unwrap().push((duration_seconds, date));
            if self.fail {
                bail!("analytics store unavailable");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use super::testing::RecordingCollaborators;
    use super::*;

    fn reporter(collab: &Arc<RecordingCollaborators>) -> ListeningAnalyticsReporter {
        ListeningAnalyticsReporter::new(collab.clone(), collab.clone())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 20, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[tokio::test]
    async fn play_pause_twice_records_two_sessions_and_balances() {
        let collab = Arc::new(RecordingCollaborators::default());
        let mut reporter = reporter(&collab);

        assert_eq!(reporter.set_playing_at(true, at(0)).await, Some(ListeningEvent::Joined));
        assert_eq!(
            reporter.set_playing_at(false, at(95)).await,
            Some(ListeningEvent::Left { duration_seconds: 95 })
        );
        reporter.set_playing_at(true, at(200)).await;
        reporter.set_playing_at(false, at(230)).await;

        assert_eq!(collab.session_count(), 2);
        assert_eq!(collab.net_delta(), 0);
        let sessions = collab.sessions.lock().unwrap().clone();
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(sessions, vec![(95, date), (30, date)]);
    }

    #[tokio::test]
    async fn duplicate_signals_are_ignored() {
        let collab = Arc::new(RecordingCollaborators::default());
        let mut reporter = reporter(&collab);

        assert_eq!(reporter.set_playing_at(false, at(0)).await, None);
        reporter.set_playing_at(true, at(1)).await;
        assert_eq!(reporter.set_playing_at(true, at(2)).await, None);
        assert_eq!(reporter.open_interval().map(|i| i.started_at), Some(at(1)));
        reporter.set_playing_at(false, at(5)).await;
        assert_eq!(reporter.set_playing_at(false, at(6)).await, None);

        assert_eq!(*collab.deltas.lock().unwrap(), vec![1, -1]);
        assert_eq!(collab.session_count(), 1);
    }

    #[tokio::test]
    async fn duration_is_floored_to_whole_seconds() {
        let collab = Arc::new(RecordingCollaborators::default());
        let mut reporter = reporter(&collab);

        reporter.set_playing_at(true, at(0)).await;
        let event = reporter
            .set_playing_at(false, at(12) + Duration::milliseconds(999))
            .await;

        assert_eq!(event, Some(ListeningEvent::Left { duration_seconds: 12 }));
    }

    #[tokio::test]
    async fn collaborator_failures_do_not_change_state() {
        let collab = Arc::new(RecordingCollaborators::failing());
        let mut reporter = reporter(&collab);

        assert_eq!(reporter.set_playing_at(true, at(0)).await, Some(ListeningEvent::Joined));
        assert!(reporter.open_interval().is_some());
        assert!(reporter.is_playing());

        assert!(matches!(
            reporter.set_playing_at(false, at(10)).await,
            Some(ListeningEvent::Left { .. })
        ));
        assert!(reporter.open_interval().is_none());
        assert!(!reporter.is_playing());
        assert_eq!(collab.session_count(), 1);
    }

    #[tokio::test]
    async fn close_without_interval_is_a_no_op() {
        let collab = Arc::new(RecordingCollaborators::default());
        let mut reporter = reporter(&collab);

        assert_eq!(reporter.close_at(at(3)).await, None);
        assert!(collab.deltas.lock().unwrap().is_empty());
    }
}
