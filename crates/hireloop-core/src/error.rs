// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Hireloop messaging client.

use thiserror::Error;

/// The primary error type used across all Hireloop crates.
///
/// Channel-level failures never surface through this type on the public
/// socket API; they are observable only as connection state transitions.
/// It is returned by REST calls, configuration, and argument validation.
#[derive(Debug, Error)]
pub enum HireloopError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket transport errors (connection refused, dropped, handshake rejected).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A wire frame could not be parsed or serialized.
    #[error("malformed frame: {message}")]
    Frame {
        message: String,
        source: Option<serde_json::Error>,
    },

    /// REST collaborator errors (HTTP failure, unexpected status, bad body).
    #[error("api error{}: {message}", status_suffix(.status))]
    Api {
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication failed or no usable token is available.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A draft conversation (no server id yet) was used where a persisted one is required.
    #[error("conversation for job {job_id} has not been created yet")]
    DraftConversation { job_id: u64 },

    /// The owning session or channel was already shut down.
    #[error("session closed")]
    SessionClosed,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl HireloopError {
    /// Whether this error represents a rejected or expired credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HireloopError::Auth(_))
            || matches!(self, HireloopError::Api { status: Some(401), .. })
    }
}

impl From<serde_json::Error> for HireloopError {
    fn from(err: serde_json::Error) -> Self {
        HireloopError::Frame {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
