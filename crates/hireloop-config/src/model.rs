// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hireloop messaging client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Hireloop configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HireloopConfig {
    /// Backend endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Socket reconnect policy, shared by the chat and notification channels.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Unread badge behavior.
    #[serde(default)]
    pub unread: UnreadConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base of the socket URIs, e.g. `wss://api.example.com`.
    #[serde(default = "default_ws_base")]
    pub ws_base: String,

    /// Base of the REST endpoints; `/v1/...` paths are appended.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout applied to each REST request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_base: default_ws_base(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_ws_base() -> String {
    "ws://localhost:8002".to_string()
}

fn default_api_base() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Bounded exponential backoff for socket reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Doubles on each further attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between attempts.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failed attempts before the channel gives up and waits for
    /// a manual reconnect.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    6
}

/// Unread badge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnreadConfig {
    /// Fall back to REST polling while the notification channel is down.
    #[serde(default = "default_poll_fallback")]
    pub poll_fallback: bool,

    /// How long the notification channel must be down before polling starts.
    #[serde(default = "default_poll_after_secs")]
    pub poll_after_secs: u64,

    /// Interval between fallback polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for UnreadConfig {
    fn default() -> Self {
        Self {
            poll_fallback: default_poll_fallback(),
            poll_after_secs: default_poll_after_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl UnreadConfig {
    pub fn poll_after(&self) -> Duration {
        Duration::from_secs(self.poll_after_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_poll_fallback() -> bool {
    true
}

fn default_poll_after_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level filter (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
