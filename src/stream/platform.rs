use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    Kick,
    Youtube,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Kick
    }
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Kick => "kick",
            Platform::Youtube => "youtube",
        }
    }
}

/// Target resolution tier for the embedded player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Quality {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Auto
    }
}

impl Quality {
    pub const ALL: [Quality; 5] = [
        Quality::Auto,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Auto => "auto",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
        }
    }

    /// YouTube's `vq` token for this tier. `None` lets the player pick.
    pub fn youtube_token(&self) -> Option<&'static str> {
        match self {
            Quality::Auto => None,
            Quality::P1080 => Some("hd1080"),
            Quality::P720 => Some("hd720"),
            Quality::P480 => Some("large"),
            Quality::P360 => Some("medium"),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
