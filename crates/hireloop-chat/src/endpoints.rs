// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket URIs. The access token travels as the `token` query parameter
//! because the server authenticates at handshake time.

use std::fmt;

use hireloop_core::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsEndpoints {
    base: String,
}

impl WsEndpoints {
    /// `base` is e.g. `wss://api.example.com`; a trailing slash is ignored.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/ws/chat/{conversation_id}/?token={token}`
    pub fn chat(&self, conversation_id: ConversationId, token: &str) -> String {
        format!("{}/ws/chat/{conversation_id}/?token={token}", self.base)
    }

    /// `<base>/ws/user/notifications/?token={token}`
    pub fn notifications(&self, token: &str) -> String {
        format!("{}/ws/user/notifications/?token={token}", self.base)
    }
}

/// What a channel is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScope {
    Chat(ConversationId),
    Notifications,
}

impl ChannelScope {
    pub fn url(&self, endpoints: &WsEndpoints, token: &str) -> String {
        match self {
            ChannelScope::Chat(id) => endpoints.chat(*id, token),
            ChannelScope::Notifications => endpoints.notifications(token),
        }
    }
}

impl fmt::Display for ChannelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelScope::Chat(id) => write!(f, "chat:{id}"),
            ChannelScope::Notifications => f.write_str("notifications"),
        }
    }
}
