//! Listener analytics: collaborator seams and the play/pause reporter.

pub mod reporter;
pub mod station;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use reporter::{ListeningAnalyticsReporter, ListeningEvent, ListeningInterval};
pub use station::StationAnalytics;

/// Per-station live listener counter. Implementations must apply concurrent
/// deltas from many sessions atomically.
#[async_trait]
pub trait ListenerCounter: Send + Sync {
    async fn increment(&self, delta: i64) -> Result<()>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record_session(&self, duration_seconds: u64, date: NaiveDate) -> Result<()>;
}
