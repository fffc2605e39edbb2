use std::sync::Arc;

use crate::health::HealthSimulator;
use crate::notify::{Notifier, Severity};
use crate::stream::{resolve, Quality, ResolveOptions, ResolvedStream};

use super::PlaybackSession;

pub struct QualityNotifier {
    notifier: Arc<dyn Notifier>,
    health: HealthSimulator,
    options: ResolveOptions,
}

impl QualityNotifier {
    pub fn new(notifier: Arc<dyn Notifier>, health: HealthSimulator, options: ResolveOptions) -> Self {
        Self {
            notifier,
            health,
            options,
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Applies a quality switch and returns the re-resolved stream.
    /// Selecting the current quality again changes nothing.
    pub fn on_quality_change(
        &self,
        session: &mut PlaybackSession,
        quality: Quality,
    ) -> Option<ResolvedStream> {
        if session.quality == quality {
            return None;
        }

        session.quality = quality;
        self.health.track_quality_change();
        let stream = resolve(
            &session.base_stream_url,
            session.platform,
            session.quality,
            &self.options,
        );
        self.notifier
            .notify(&format!("Stream quality changed to {quality}"), Severity::Info);
        Some(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::DEFAULT_HEALTH_INTERVAL;
    use crate::notify::testing::RecordingNotifier;
    use crate::stream::Platform;

    #[test]
    fn quality_change_updates_session_stats_and_url() {
        let notifier = Arc::new(RecordingNotifier::default());
        let health = HealthSimulator::new(DEFAULT_HEALTH_INTERVAL);
        let quality = QualityNotifier::new(notifier.clone(), health.clone(), ResolveOptions::default());
        let mut session = PlaybackSession::new(
            Platform::Kick,
            "https://player.kick.com/soundmasterlive",
            Quality::Auto,
        );

        let stream = quality.on_quality_change(&mut session, Quality::P480).unwrap();

        assert_eq!(session.quality, Quality::P480);
        assert_eq!(
            stream.playback_url,
            "https://player.kick.com/soundmasterlive?quality=480p"
        );
        assert_eq!(health.snapshot().stats.quality_changes, 1);
        let seen = notifier.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].severity, Severity::Info);
        assert!(seen[0].message.contains("480p"));
    }

    #[test]
    fn reselecting_same_quality_is_ignored() {
        let notifier = Arc::new(RecordingNotifier::default());
        let health = HealthSimulator::new(DEFAULT_HEALTH_INTERVAL);
        let quality = QualityNotifier::new(notifier.clone(), health.clone(), ResolveOptions::default());
        let mut session = PlaybackSession::new(
            Platform::Youtube,
            "https://www.youtube.com/watch?v=abc123",
            Quality::P720,
        );

        assert!(quality.on_quality_change(&mut session, Quality::P720).is_none());
        assert_eq!(health.snapshot().stats.quality_changes, 0);
        assert!(notifier.take().is_empty());
    }
}
