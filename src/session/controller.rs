use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex, MutexGuard},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    analytics::{AnalyticsStore, ListenerCounter, ListeningAnalyticsReporter},
    error::StreamError,
    health::{HealthHandle, HealthSimulator, HealthSnapshot, HealthSource},
    notify::Notifier,
    stream::{resolve, Quality, ResolvedStream},
};

use super::{PlaybackSession, QualityNotifier, SessionConfig, SessionState, SessionStateMachine};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// What observers see after every session-level change.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: PlaybackSession,
    pub stream: ResolvedStream,
    pub is_playing: bool,
}

/// Url and key handed to the embedding surface. A new key means the player
/// must be re-created even if the url did not change.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTarget {
    pub url: String,
    pub key: u64,
}

struct SessionInner {
    machine: SessionStateMachine,
    stream: ResolvedStream,
}

impl SessionInner {
    fn embed_target(&self) -> EmbedTarget {
        EmbedTarget {
            url: self.stream.playback_url.clone(),
            key: self.machine.session().retry_epoch,
        }
    }
}

struct SessionLoops {
    health: HealthHandle,
    clock_token: CancellationToken,
    clock: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Mounted(SessionLoops),
    TornDown,
}

/// Owns one listener's playback session from mount to teardown.
#[derive(Clone)]
pub struct LiveSessionController {
    inner: Arc<Mutex<SessionInner>>,
    reporter: Arc<Mutex<ListeningAnalyticsReporter>>,
    health: HealthSimulator,
    quality: Arc<QualityNotifier>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    watchdog: Arc<Mutex<Option<JoinHandle<()>>>>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    clock: Arc<watch::Sender<DateTime<Utc>>>,
    config: SessionConfig,
}

impl LiveSessionController {
    pub fn new(
        config: SessionConfig,
        session: PlaybackSession,
        notifier: Arc<dyn Notifier>,
        listeners: Arc<dyn ListenerCounter>,
        analytics: Arc<dyn AnalyticsStore>,
    ) -> Self {
        let stream = resolve(
            &session.base_stream_url,
            session.platform,
            session.quality,
            &config.resolve,
        );
        let health = HealthSimulator::new(config.health_interval);
        let quality = QualityNotifier::new(notifier.clone(), health.clone(), config.resolve.clone());
        let machine = SessionStateMachine::new(session, notifier);

        let (snapshots, _) = watch::channel(SessionSnapshot {
            state: machine.state().clone(),
            session: machine.session().clone(),
            stream: stream.clone(),
            is_playing: false,
        });
        let (clock, _) = watch::channel(Utc::now());

        Self {
            inner: Arc::new(Mutex::new(SessionInner { machine, stream })),
            reporter: Arc::new(Mutex::new(ListeningAnalyticsReporter::new(listeners, analytics))),
            health,
            quality: Arc::new(quality),
            lifecycle: Arc::new(Mutex::new(Lifecycle::Idle)),
            watchdog: Arc::new(Mutex::new(None)),
            snapshots: Arc::new(snapshots),
            clock: Arc::new(clock),
            config,
        }
    }

    /// Locks the lifecycle for the duration of a mutation. Fails once the
    /// session is torn down, so nothing started under the guard can outlive
    /// teardown.
    async fn live(&self) -> Result<MutexGuard<'_, Lifecycle>> {
        let lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::TornDown) {
            return Err(StreamError::TornDown.into());
        }
        Ok(lifecycle)
    }

    /// Starts the health and clock loops. A session mounts once.
    pub async fn mount(&self, source: Box<dyn HealthSource>) -> Result<EmbedTarget> {
        let mut lifecycle = self.live().await?;
        if matches!(*lifecycle, Lifecycle::Mounted(_)) {
            return Err(StreamError::AlreadyMounted.into());
        }

        self.health.reset();
        let health = self.health.start(source);
        let clock_token = CancellationToken::new();
        let clock = tokio::spawn(clock_loop(
            self.clock.clone(),
            self.config.clock_interval,
            clock_token.clone(),
        ));

        *lifecycle = Lifecycle::Mounted(SessionLoops {
            health,
            clock_token,
            clock,
        });

        let target = self.inner.lock().await.embed_target();
        self.arm_watchdog(&lifecycle, target.key).await;
        info!("Session mounted: {}", target.url);
        Ok(target)
    }

    /// Cancels both timer loops and closes any open listening interval.
    /// Nothing mutates session state after this returns; later calls fail
    /// with [`StreamError::TornDown`].
    pub async fn teardown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.lifecycle.lock().await, Lifecycle::TornDown);
        self.disarm_watchdog().await;

        let stopped = match previous {
            Lifecycle::Mounted(loops) => stop_loops(loops).await,
            _ => Ok(()),
        };
        if let Err(err) = &stopped {
            log_error!("Session loops did not stop cleanly: {err:#}");
        }

        // The interval is closed even when a loop failed to join.
        self.reporter.lock().await.close_at(Utc::now()).await;
        self.snapshots.send_modify(|snapshot| snapshot.is_playing = false);
        info!("Session torn down");
        stopped
    }

    pub async fn is_mounted(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Mounted(_))
    }

    pub async fn embed_target(&self) -> EmbedTarget {
        self.inner.lock().await.embed_target()
    }

    pub async fn stream(&self) -> ResolvedStream {
        self.inner.lock().await.stream.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.machine.state().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<HealthSnapshot> {
        self.health.subscribe()
    }

    pub fn subscribe_clock(&self) -> watch::Receiver<DateTime<Utc>> {
        self.clock.subscribe()
    }

    pub async fn on_load_success(&self) -> Result<SessionState> {
        let _lifecycle = self.live().await?;
        self.disarm_watchdog().await;
        let mut inner = self.inner.lock().await;
        let state = inner.machine.on_load_success().clone();
        self.publish(&inner);
        Ok(state)
    }

    pub async fn on_load_error(&self, detail: &str) -> Result<SessionState> {
        let _lifecycle = self.live().await?;
        self.disarm_watchdog().await;
        log_warn!(
            "{}",
            StreamError::Load {
                reason: detail.to_string()
            }
        );
        let mut inner = self.inner.lock().await;
        let state = inner.machine.on_load_error().clone();
        self.publish(&inner);
        Ok(state)
    }

    /// Manual retry: back to loading with a fresh embed key.
    pub async fn retry(&self) -> Result<EmbedTarget> {
        let lifecycle = self.live().await?;
        let target = {
            let mut inner = self.inner.lock().await;
            inner.machine.on_retry();
            let stream = {
                let session = inner.machine.session();
                resolve(
                    &session.base_stream_url,
                    session.platform,
                    session.quality,
                    self.quality.options(),
                )
            };
            inner.stream = stream;
            self.publish(&inner);
            inner.embed_target()
        };
        self.arm_watchdog(&lifecycle, target.key).await;
        Ok(target)
    }

    pub async fn change_quality(&self, quality: Quality) -> Result<EmbedTarget> {
        let _lifecycle = self.live().await?;
        let mut inner = self.inner.lock().await;
        if let Some(stream) = self
            .quality
            .on_quality_change(inner.machine.session_mut(), quality)
        {
            inner.stream = stream;
            self.publish(&inner);
        }
        Ok(inner.embed_target())
    }

    /// Returns whether chat is now open.
    pub async fn toggle_chat(&self) -> Result<bool> {
        let _lifecycle = self.live().await?;
        let mut inner = self.inner.lock().await;
        let session = inner.machine.session_mut();
        session.chat_open = !session.chat_open;
        let open = session.chat_open;
        self.publish(&inner);
        Ok(open)
    }

    /// Play/pause edge from the player. The lifecycle stays locked until the
    /// listener delta is reported, so teardown always sees the open interval.
    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        let _lifecycle = self.live().await?;
        self.reporter.lock().await.set_playing(playing).await;
        self.snapshots
            .send_modify(|snapshot| snapshot.is_playing = playing);
        Ok(())
    }

    async fn on_load_timeout(&self, epoch: u64) {
        let Ok(_lifecycle) = self.live().await else {
            return;
        };
        let mut inner = self.inner.lock().await;
        if inner.machine.on_load_timeout(epoch) {
            log_warn!("Stream load timed out (epoch {epoch})");
            self.publish(&inner);
        }
    }

    async fn arm_watchdog(&self, lifecycle: &Lifecycle, epoch: u64) {
        let Some(timeout) = self.config.load_timeout else {
            return;
        };
        if matches!(lifecycle, Lifecycle::TornDown) {
            return;
        }

        let mut guard = self.watchdog.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        *guard = Some(tokio::spawn(async move {
            time::sleep(timeout).await;
            controller.on_load_timeout(epoch).await;
        }));
    }

    async fn disarm_watchdog(&self) {
        if let Some(handle) = self.watchdog.lock().await.take() {
            handle.abort();
        }
    }

    fn publish(&self, inner: &SessionInner) {
        self.snapshots.send_modify(|snapshot| {
            snapshot.state = inner.machine.state().clone();
            snapshot.session = inner.machine.session().clone();
            snapshot.stream = inner.stream.clone();
        });
    }
}

/// Stops both loops, joining each even if the other failed.
async fn stop_loops(loops: SessionLoops) -> Result<()> {
    loops.clock_token.cancel();
    let health = loops.health.stop().await;
    let clock = loops.clock.await.context("clock loop task failed to join");
    health.and(clock)
}

async fn clock_loop(
    clock: Arc<watch::Sender<DateTime<Utc>>>,
    period: time::Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                clock.send_replace(Utc::now());
            }
        }
    }

    log_debug!("clock loop stopped");
}
