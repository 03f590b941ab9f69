// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket wire frames.
//!
//! Client -> Server (JSON, one object per frame):
//! ```json
//! {"content": "Hello"}
//! {"type": "read", "message_id": 12}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "message", "id": 12, "sender": 3, "content": "Hello", ...}
//! {"type": "read_ack", "message_id": 12}
//! {"type": "unread_event", "conversation_id": 501, "message_id": 12, "sender_id": 3, "created_at": "..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::HireloopError;
use crate::types::{MessageId, MessageRecord, UnreadEvent};

/// Tag value of an outgoing read marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadTag {
    Read,
}

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutgoingFrame {
    /// `{"type": "read", "message_id": n}`
    Read {
        #[serde(rename = "type")]
        tag: ReadTag,
        message_id: MessageId,
    },
    /// `{"content": "..."}`
    Message { content: String },
}

impl OutgoingFrame {
    pub fn message(content: impl Into<String>) -> Self {
        OutgoingFrame::Message {
            content: content.into(),
        }
    }

    pub fn read(message_id: MessageId) -> Self {
        OutgoingFrame::Read {
            tag: ReadTag::Read,
            message_id,
        }
    }

    /// Serialize to the single-line JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, HireloopError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingFrame {
    /// A chat message; remaining fields form the message record.
    Message(MessageRecord),
    /// Confirms a read marker was recorded server-side.
    ReadAck { message_id: MessageId },
    /// Unread push from the notification channel.
    UnreadEvent(UnreadEvent),
}

impl IncomingFrame {
    /// Parse a raw text frame. Unknown `type` values and malformed JSON are errors
    /// the caller logs and drops.
    pub fn parse(raw: &str) -> Result<Self, HireloopError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Frame kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingFrame::Message(_) => "message",
            IncomingFrame::ReadAck { .. } => "read_ack",
            IncomingFrame::UnreadEvent(_) => "unread_event",
        }
    }
}
