use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One periodic snapshot of stream performance. Superseded by the next one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub bitrate_kbps: u32,
    pub fps: u32,
    pub latency_ms: u32,
    pub buffering: bool,
    pub dropped_frames: u32,
}

/// Session-lifetime counters. Everything except `view_count` and
/// `duration_seconds` only ever grows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub duration_seconds: u64,
    pub view_count: u32,
    pub peak_viewers: u32,
    pub buffering_events: u64,
    pub quality_changes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub sample: Option<HealthSample>,
    pub stats: StreamStats,
    pub ticks: u64,
}

impl HealthSnapshot {
    pub fn apply_tick(&mut self, sample: HealthSample, elapsed: Duration, view_count: u32) {
        self.stats.duration_seconds = elapsed.as_secs();
        if sample.buffering {
            self.stats.buffering_events += 1;
        }
        self.stats.view_count = view_count;
        self.stats.peak_viewers = self.stats.peak_viewers.max(view_count);
        self.sample = Some(sample);
        self.ticks += 1;
    }

    pub fn record_quality_change(&mut self) {
        self.stats.quality_changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(buffering: bool) -> HealthSample {
        HealthSample {
            bitrate_kbps: 3000,
            fps: 30,
            latency_ms: 80,
            buffering,
            dropped_frames: 0,
        }
    }

    #[test]
    fn peak_survives_lower_view_counts() {
        let mut snapshot = HealthSnapshot::default();
        snapshot.apply_tick(sample(false), Duration::from_secs(2), 120);
        snapshot.apply_tick(sample(true), Duration::from_secs(4), 80);

        assert_eq!(snapshot.stats.view_count, 80);
        assert_eq!(snapshot.stats.peak_viewers, 120);
        assert_eq!(snapshot.stats.buffering_events, 1);
        assert_eq!(snapshot.stats.duration_seconds, 4);
        assert_eq!(snapshot.ticks, 2);
    }
}
