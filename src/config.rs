//! Chat and server configuration.
//!
//! `ChatConfig` tunes the broker, the delivery loop and draft sessions.
//! `ServerConfig` wraps it with the listen address and is normally built
//! from environment variables by the server binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Tunables shared by the broker, subscription channels and draft sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum characters stored by a single `append` call.
    #[serde(default = "default_max_fragment_length")]
    pub max_fragment_length: usize,
    /// Characters of trailing draft content shown in previews.
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
    /// Idle time before a delivery loop emits a keepalive (milliseconds).
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// How long a participant may wait before a reminder is broadcast (seconds).
    #[serde(default = "default_waiting_reminder_secs")]
    pub waiting_reminder_secs: u64,
    /// Period of the background reminder sweep (milliseconds).
    #[serde(default = "default_reminder_sweep_ms")]
    pub reminder_sweep_ms: u64,
    /// Quiet time inside `check()` before the caller is announced as waiting (milliseconds).
    #[serde(default = "default_announce_waiting_after_ms")]
    pub announce_waiting_after_ms: u64,
    /// Reject chat broadcasts from anyone but the stick holder while it is held.
    #[serde(default)]
    pub enforce_talking_stick: bool,
    /// Capacity of the read-only message feed.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_max_fragment_length() -> usize { 200 }
fn default_preview_length() -> usize { 50 }
fn default_keepalive_interval_ms() -> u64 { 1000 }
fn default_waiting_reminder_secs() -> u64 { 10 }
fn default_reminder_sweep_ms() -> u64 { 1000 }
fn default_announce_waiting_after_ms() -> u64 { 2000 }
fn default_feed_capacity() -> usize { 1024 }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_fragment_length: default_max_fragment_length(),
            preview_length: default_preview_length(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            waiting_reminder_secs: default_waiting_reminder_secs(),
            reminder_sweep_ms: default_reminder_sweep_ms(),
            announce_waiting_after_ms: default_announce_waiting_after_ms(),
            enforce_talking_stick: false,
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl ChatConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn waiting_reminder(&self) -> Duration {
        Duration::from_secs(self.waiting_reminder_secs)
    }

    pub fn reminder_sweep(&self) -> Duration {
        Duration::from_millis(self.reminder_sweep_ms)
    }

    pub fn announce_waiting_after(&self) -> Duration {
        Duration::from_millis(self.announce_waiting_after_ms)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Listen address plus the chat tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8890 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            chat: ChatConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build a config from the process environment.
    ///
    /// - `TALKROOM_HOST` — bind host (default `0.0.0.0`)
    /// - `TALKROOM_PORT` or `PORT` — bind port (default 8890)
    /// - `TALKROOM_MAX_FRAGMENT` — per-append character limit
    /// - `TALKROOM_KEEPALIVE_MS` — delivery keepalive interval
    /// - `TALKROOM_ENFORCE_STICK` — `true`/`1` to gate chat on the stick
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("TALKROOM_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "TALKROOM_PORT").or_else(|| parse_var(&lookup, "PORT")) {
            config.port = port;
        }
        if let Some(limit) = parse_var::<usize>(&lookup, "TALKROOM_MAX_FRAGMENT") {
            if limit == 0 {
                warn!("TALKROOM_MAX_FRAGMENT must be positive, keeping {}", config.chat.max_fragment_length);
            } else {
                config.chat.max_fragment_length = limit;
            }
        }
        if let Some(ms) = parse_var(&lookup, "TALKROOM_KEEPALIVE_MS") {
            config.chat.keepalive_interval_ms = ms;
        }
        if let Some(raw) = lookup("TALKROOM_ENFORCE_STICK") {
            config.chat.enforce_talking_stick = matches!(raw.trim(), "1" | "true" | "yes" | "on");
        }

        config
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
