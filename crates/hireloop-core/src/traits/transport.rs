// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket transport adapter trait.

use tokio::sync::mpsc;
use tracing::warn;

use crate::frames::OutgoingFrame;

/// Close codes the server uses to reject a handshake credential.
pub const AUTH_REJECTED_CLOSE_CODES: [u16; 2] = [4001, 4003];

/// Details of a closed connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    /// WebSocket close code, or the HTTP status when the handshake was refused.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// True when the server refused the credential carried in the URL.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.code, Some(401) | Some(403))
            || self
                .code
                .is_some_and(|c| AUTH_REJECTED_CLOSE_CODES.contains(&c))
    }
}

/// Replace the `token` query value in a socket URL so it can be logged.
pub fn redact_token(url: &str) -> String {
    match url.find("token=") {
        Some(start) => {
            let value_start = start + "token=".len();
            let value_end = url[value_start..]
                .find('&')
                .map_or(url.len(), |i| value_start + i);
            format!("{}<redacted>{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

/// Lifecycle and data events from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Open,
    /// One raw text frame.
    Message(String),
    /// The connection is gone. Always the last event.
    Close(CloseInfo),
    /// A failure; a `Close` follows.
    Error(String),
}

/// Control side of one connection.
pub trait TransportHandle: Send + Sync {
    /// Transmit one text frame. Silently does nothing unless the connection is open.
    fn send_text(&self, text: String);

    /// Close the connection. Closing twice is a no-op.
    fn close(&self);

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Serialize and transmit a frame. Does nothing unless open.
    fn send(&self, frame: &OutgoingFrame) {
        if !self.is_open() {
            return;
        }
        match frame.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => warn!(error = %e, "dropping unserializable frame"),
        }
    }
}

/// One opened connection: its control handle plus its event stream.
pub struct Connection {
    pub handle: Box<dyn TransportHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens persistent bidirectional connections.
///
/// `open` returns immediately; the handshake outcome arrives later as
/// [`TransportEvent::Open`] or as `Error` followed by `Close`. Implementations
/// never retry.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> Connection;
}
