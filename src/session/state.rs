use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::notify::{Notifier, Severity};
use crate::stream::{Platform, Quality};

pub const LOAD_ERROR_MESSAGE: &str = "Failed to load stream. Please try again.";
pub const LOAD_TIMEOUT_MESSAGE: &str = "Stream took too long to respond.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    Loading,
    Online,
    Errored { reason: String },
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Loading
    }
}

impl SessionState {
    pub fn is_online(&self) -> bool {
        matches!(self, SessionState::Online)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SessionState::Errored { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    pub platform: Platform,
    pub base_stream_url: String,
    pub quality: Quality,
    pub chat_open: bool,
    /// Bumped on every retry so the embedding surface re-acquires the player.
    pub retry_epoch: u64,
}

impl PlaybackSession {
    pub fn new(platform: Platform, base_stream_url: impl Into<String>, quality: Quality) -> Self {
        Self {
            platform,
            base_stream_url: base_stream_url.into(),
            quality,
            chat_open: false,
            retry_epoch: 0,
        }
    }
}

/// Lifecycle of one playback attempt.
///
/// Every event produces exactly one transition and exactly one notification.
/// Load failures are never retried automatically.
pub struct SessionStateMachine {
    session: PlaybackSession,
    state: SessionState,
    notifier: Arc<dyn Notifier>,
}

impl SessionStateMachine {
    pub fn new(session: PlaybackSession, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            session,
            state: SessionState::default(),
            notifier,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.session
    }

    pub fn on_load_success(&mut self) -> &SessionState {
        self.state = SessionState::Online;
        self.notifier.notify("Stream is online", Severity::Success);
        &self.state
    }

    pub fn on_load_error(&mut self) -> &SessionState {
        self.state = SessionState::Errored {
            reason: LOAD_ERROR_MESSAGE.to_string(),
        };
        self.notifier.notify(LOAD_ERROR_MESSAGE, Severity::Error);
        &self.state
    }

    /// Returns the new epoch.
    pub fn on_retry(&mut self) -> u64 {
        self.session.retry_epoch += 1;
        self.state = SessionState::Loading;
        self.notifier
            .notify("Retrying stream connection...", Severity::Info);
        self.session.retry_epoch
    }

    /// Fails a load attempt that never reported back. Ignored unless the
    /// session is still loading the same epoch.
    pub fn on_load_timeout(&mut self, epoch: u64) -> bool {
        if epoch != self.session.retry_epoch || self.state != SessionState::Loading {
            return false;
        }
        self.state = SessionState::Errored {
            reason: LOAD_TIMEOUT_MESSAGE.to_string(),
        };
        self.notifier.notify(LOAD_TIMEOUT_MESSAGE, Severity::Warning);
        true
    }
}
