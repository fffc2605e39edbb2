use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{HealthSnapshot, HealthSource};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(2000);

/// Periodically pulls samples from a [`HealthSource`] and folds them into
/// [`HealthSnapshot`] stats.
///
/// The snapshot lives in a `watch` channel; every tick and every quality
/// change is a single `send_modify`, so readers never see a sample without
/// its stats update.
#[derive(Clone)]
pub struct HealthSimulator {
    updates: Arc<watch::Sender<HealthSnapshot>>,
    interval: Duration,
}

impl HealthSimulator {
    pub fn new(interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(HealthSnapshot::default());
        Self {
            updates: Arc::new(tx),
            interval,
        }
    }

    pub fn start(&self, source: Box<dyn HealthSource>) -> HealthHandle {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(health_loop(
            source,
            self.updates.clone(),
            self.interval,
            cancel_token.clone(),
        ));

        HealthHandle {
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.updates.subscribe()
    }

    /// Clears stats for a fresh mount. Call before `start`.
    pub fn reset(&self) {
        self.updates.send_replace(HealthSnapshot::default());
    }

    /// Counts a quality switch right away instead of waiting for the next tick.
    pub fn track_quality_change(&self) {
        self.updates.send_modify(|snapshot| snapshot.record_quality_change());
    }
}

/// Cancel handle for a running simulator loop.
pub struct HealthHandle {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl HealthHandle {
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancels the loop and waits for it to exit. Once this returns the
    /// snapshot is no longer mutated by ticks.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel_token.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.context("health loop task failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for HealthHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn health_loop(
    mut source: Box<dyn HealthSource>,
    updates: Arc<watch::Sender<HealthSnapshot>>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let started = Instant::now();
    let mut ticker = time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("health simulator started ({}ms interval)", period.as_millis());

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if cancel_token.is_cancelled() {
                    break;
                }
                let sample = source.next_sample();
                let viewers = source.viewer_count();
                let elapsed = started.elapsed();
                updates.send_modify(|snapshot| snapshot.apply_tick(sample, elapsed, viewers));
                log_debug!(
                    "health tick: {}kbps {}fps {}ms buffering={} viewers={}",
                    sample.bitrate_kbps,
                    sample.fps,
                    sample.latency_ms,
                    sample.buffering,
                    viewers
                );
            }
        }
    }

    log_info!("health simulator stopped");
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::super::{HealthSample, HealthSource};

    /// Replays fixed buffering flags and viewer counts, cycling when exhausted.
    pub struct ScriptedSource {
        buffering: VecDeque<bool>,
        viewers: VecDeque<u32>,
    }

    impl ScriptedSource {
        pub fn new(buffering: &[bool], viewers: &[u32]) -> Self {
            Self {
                buffering: buffering.iter().copied().collect(),
                viewers: viewers.iter().copied().collect(),
            }
        }
    }

    impl HealthSource for ScriptedSource {
        fn next_sample(&mut self) -> HealthSample {
            let buffering = self.buffering.pop_front().unwrap_or(false);
            self.buffering.push_back(buffering);
            HealthSample {
                bitrate_kbps: 3000,
                fps: 30,
                latency_ms: 75,
                buffering,
                dropped_frames: 0,
            }
        }

        fn viewer_count(&mut self) -> u32 {
            let viewers = self.viewers.pop_front().unwrap_or(100);
            self.viewers.push_back(viewers);
            viewers
        }
    }
}
