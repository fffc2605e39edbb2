//! User-facing notifications emitted by the session controller.
//!
//! The controller only depends on [`Notifier`]; delivery (toast, log line,
//! channel to a UI layer) is up to the implementation.

use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Writes notifications to the log at a level matching their severity.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => info!("[notify] {message}"),
            Severity::Warning => warn!("[notify] {message}"),
            Severity::Error => error!("[notify] {message}"),
        }
    }
}

/// Fans notifications out to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        // No subscribers is fine; the notification is simply dropped.
        let _ = self.sender.send(Notification {
            message: message.to_string(),
            severity,
        });
    }
}

/// Forwards every notification to each inner notifier in order.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        for target in &self.targets {
            target.notify(message, severity);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records notifications for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub seen: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn take(&self) -> Vec<Notification> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, severity: Severity) {
            self.seen.lock().unwrap().push(Notification {
                message: message.to_string(),
                severity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.notify("Stream is online", Severity::Success);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "Stream is online");
        assert_eq!(received.severity, Severity::Success);
    }

    #[test]
    fn broadcast_without_subscribers_does_not_panic() {
        BroadcastNotifier::new().notify("nobody listening", Severity::Info);
    }

    #[test]
    fn fanout_forwards_to_every_target() {
        let first = Arc::new(RecordingNotifier::default());
        let second = Arc::new(RecordingNotifier::default());
        let fanout = FanoutNotifier::new(vec![
            first.clone() as Arc<dyn Notifier>,
            second.clone() as Arc<dyn Notifier>,
            Arc::new(LogNotifier) as Arc<dyn Notifier>,
        ]);

        fanout.notify("quality changed", Severity::Info);

        assert_eq!(first.take().len(), 1);
        assert_eq!(second.take().len(), 1);
    }
}
