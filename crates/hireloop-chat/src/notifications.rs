// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Receive-only notification channel, one per login session.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use hireloop_core::frames::IncomingFrame;
use hireloop_core::{ConnectionState, UnreadEvent};

use crate::endpoints::ChannelScope;
use crate::handlers::HandlerSlot;
use crate::supervisor::{Channel, ChannelContext, FrameRouter};

/// Receives unread pushes.
pub trait UnreadEvents: Send + Sync + 'static {
    fn on_unread_event(&self, event: UnreadEvent);
}

struct UnreadRouter {
    handler: Arc<HandlerSlot<dyn UnreadEvents>>,
}

impl FrameRouter for UnreadRouter {
    fn route(&self, _scope: ChannelScope, frame: IncomingFrame) {
        match frame {
            IncomingFrame::UnreadEvent(event) => match self.handler.current() {
                Some(handler) => handler.on_unread_event(event),
                None => debug!(conversation_id = %event.conversation_id, "no unread handler, dropping event"),
            },
            other => debug!(kind = other.kind(), "ignoring frame on notification channel"),
        }
    }
}

pub struct UnreadChannelClient {
    channel: Channel,
    handler: Arc<HandlerSlot<dyn UnreadEvents>>,
}

impl UnreadChannelClient {
    pub fn new(context: ChannelContext) -> Self {
        Self {
            channel: Channel::new(context),
            handler: Arc::new(HandlerSlot::new()),
        }
    }

    pub fn set_handler(&self, handler: Arc<dyn UnreadEvents>) {
        self.handler.set(handler);
    }

    pub fn clear_handler(&self) {
        self.handler.clear();
    }

    /// Open the notification socket. Calling it again while a socket is
    /// running does nothing, except that a `Failed` channel retries.
    pub fn connect(&self) {
        let router = Arc::new(UnreadRouter {
            handler: Arc::clone(&self.handler),
        });
        if !self.channel.start(ChannelScope::Notifications, router) {
            self.channel.reconnect();
        }
    }

    /// Close on logout. No retry follows.
    pub fn close(&self) {
        self.channel.stop();
    }

    pub fn connected(&self) -> bool {
        self.channel.connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.subscribe()
    }
}
