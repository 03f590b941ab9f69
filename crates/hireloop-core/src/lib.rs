// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Hireloop messaging client.
//!
//! This crate provides the error type, domain types, socket wire frames and
//! the collaborator traits (transport, REST API, token source) used
//! throughout the Hireloop workspace.

pub mod error;
pub mod frames;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HireloopError;
pub use frames::{IncomingFrame, OutgoingFrame};
pub use types::{
    AccessToken, ConnectionState, Conversation, ConversationId, ConversationSummary,
    DraftConversation, JobId, Message, MessageId, MessageRecord, MessageStatus,
    PersistentConversation, Role, UnreadEvent, UserId, Viewer,
};

pub use traits::{MessagingApi, TokenProvider, Transport, TransportEvent, TransportHandle};
