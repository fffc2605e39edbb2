use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{StreamError, StreamResult};

use super::{Platform, Quality};

const KICK_CHAT_HOST: &str = "kick.com";
const YOUTUBE_LIVE_CHAT: &str = "https://www.youtube.com/live_chat";
const DEFAULT_KICK_SLUG: &str = "soundmasterlive";

fn kick_player_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://player\.kick\.com/([A-Za-z0-9_-]+)").expect("kick player pattern")
    })
}

/// Everything the resolver needs besides the session itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Host of the page embedding the player; YouTube requires it for chat.
    pub embed_domain: String,
    pub kick_fallback_slug: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            embed_domain: "localhost".into(),
            kick_fallback_slug: DEFAULT_KICK_SLUG.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStream {
    pub playback_url: String,
    /// Empty when the platform offers no chat for this url.
    pub chat_url: String,
}

impl ResolvedStream {
    pub fn chat_available(&self) -> bool {
        !self.chat_url.is_empty()
    }
}

/// Maps a base stream url to the embeddable player url and its chat url.
///
/// Malformed urls never fail here: the playback url falls back to `base_url`
/// and the chat url to empty.
pub fn resolve(
    base_url: &str,
    platform: Platform,
    quality: Quality,
    options: &ResolveOptions,
) -> ResolvedStream {
    let playback_url = match playback_url(base_url, platform, quality) {
        Ok(url) => url,
        Err(err) => {
            warn!("Falling back to unmodified stream url: {err}");
            base_url.to_string()
        }
    };

    let chat_url = match chat_url(base_url, platform, options) {
        Ok(url) => url,
        Err(err) => {
            warn!("Chat unavailable: {err}");
            String::new()
        }
    };

    ResolvedStream {
        playback_url,
        chat_url,
    }
}

pub fn playback_url(base_url: &str, platform: Platform, quality: Quality) -> StreamResult<String> {
    match platform {
        Platform::Kick => {
            if quality == Quality::Auto || !kick_player_re().is_match(base_url) {
                return Ok(base_url.to_string());
            }
            let mut url = parse(base_url)?;
            set_query_param(&mut url, "quality", Some(quality.as_str()));
            Ok(url.to_string())
        }
        Platform::Youtube => {
            let mut url = parse(base_url)?;
            let token = quality.youtube_token();
            if token.is_none() && !url.query_pairs().any(|(key, _)| key == "vq") {
                return Ok(base_url.to_string());
            }
            set_query_param(&mut url, "vq", token);
            Ok(url.to_string())
        }
    }
}

pub fn chat_url(base_url: &str, platform: Platform, options: &ResolveOptions) -> StreamResult<String> {
    match platform {
        Platform::Kick => {
            let channel = kick_player_re()
                .captures(base_url)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .unwrap_or(options.kick_fallback_slug.as_str());
            Ok(format!("https://{KICK_CHAT_HOST}/{channel}/chatroom"))
        }
        Platform::Youtube => {
            let url = parse(base_url)?;
            let chat = match youtube_chat_source(&url) {
                Some(YoutubeChatSource::Channel(channel)) => {
                    live_chat_url("channel", &channel, &options.embed_domain)?
                }
                Some(YoutubeChatSource::Video(video_id)) => {
                    live_chat_url("v", &video_id, &options.embed_domain)?
                }
                None => String::new(),
            };
            Ok(chat)
        }
    }
}

enum YoutubeChatSource {
    Video(String),
    Channel(String),
}

fn youtube_chat_source(url: &Url) -> Option<YoutubeChatSource> {
    let query_value = |name: &str| {
        url.query_pairs()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let embedded = segments
        .iter()
        .position(|segment| *segment == "embed")
        .and_then(|idx| segments.get(idx + 1).copied());

    // embed/live_stream?channel=<id> is a channel's current broadcast
    if embedded == Some("live_stream") {
        return query_value("channel").map(YoutubeChatSource::Channel);
    }

    if let Some(video_id) = query_value("v") {
        return Some(YoutubeChatSource::Video(video_id));
    }

    embedded.map(|id| YoutubeChatSource::Video(id.to_string()))
}

fn live_chat_url(key: &str, value: &str, embed_domain: &str) -> StreamResult<String> {
    Url::parse_with_params(YOUTUBE_LIVE_CHAT, &[(key, value), ("embed_domain", embed_domain)])
        .map(|url| url.to_string())
        .map_err(|source| StreamError::UrlParse {
            url: YOUTUBE_LIVE_CHAT.to_string(),
            source,
        })
}

fn parse(raw: &str) -> StreamResult<Url> {
    Url::parse(raw).map_err(|source| StreamError::UrlParse {
        url: raw.to_string(),
        source,
    })
}

/// Replaces `key` in the query, keeping the other pairs in order.
fn set_query_param(url: &mut Url, key: &str, value: Option<&str>) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() && value.is_none() {
        url.set_query(None);
        return;
    }

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    pairs.extend_pairs(retained.iter());
    if let Some(value) = value {
        pairs.append_pair(key, value);
    }
}
