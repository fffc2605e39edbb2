pub mod controller;
pub mod quality;
pub mod state;

use std::time::Duration;

use crate::health::DEFAULT_HEALTH_INTERVAL;
use crate::stream::ResolveOptions;

pub use controller::{EmbedTarget, LiveSessionController, SessionSnapshot};
pub use quality::QualityNotifier;
pub use state::{
    PlaybackSession, SessionState, SessionStateMachine, LOAD_ERROR_MESSAGE, LOAD_TIMEOUT_MESSAGE,
};

pub const DEFAULT_CLOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing and url options for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub health_interval: Duration,
    pub clock_interval: Duration,
    /// Off by default: an embed that neither loads nor errors stays loading.
    pub load_timeout: Option<Duration>,
    pub resolve: ResolveOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            health_interval: DEFAULT_HEALTH_INTERVAL,
            clock_interval: DEFAULT_CLOCK_INTERVAL,
            load_timeout: None,
            resolve: ResolveOptions::default(),
        }
    }
}
