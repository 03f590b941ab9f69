// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time channel clients and conversation state for Hireloop.
//!
//! - [`ChatChannelClient`]: one socket per mounted conversation.
//! - [`UnreadChannelClient`]: one receive-only socket per login session.
//! - [`Reconciler`]: merges REST history and live frames into one ordered,
//!   de-duplicated message list with a derived unread count.
//! - [`ConversationController`]: ties a chat channel, a reconciler and the
//!   REST collaborator together, including draft promotion.
//! - [`Inbox`]: conversation list view model.
//!
//! Both channel clients share the reconnect supervisor in [`supervisor`]:
//! bounded exponential backoff, token refresh on expiry or auth rejection,
//! and epoch-guarded dispatch so a retired channel never reports late events.

pub mod backoff;
pub mod chat;
pub mod controller;
pub mod endpoints;
pub mod handlers;
pub mod inbox;
pub mod notifications;
pub mod reconciler;
pub mod supervisor;

pub use backoff::ReconnectPolicy;
pub use chat::{ChatChannelClient, ChatEvents};
pub use controller::{ConversationController, ConversationSnapshot, SendOutcome};
pub use endpoints::WsEndpoints;
pub use handlers::HandlerSlot;
pub use inbox::Inbox;
pub use notifications::{UnreadChannelClient, UnreadEvents};
pub use reconciler::{PendingMessage, Reconciler};
pub use supervisor::ChannelContext;
