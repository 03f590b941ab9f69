// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat channel client: one socket for the conversation currently mounted.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use hireloop_core::frames::{IncomingFrame, OutgoingFrame};
use hireloop_core::{
    ConnectionState, Conversation, ConversationId, HireloopError, MessageId, MessageRecord,
};

use crate::endpoints::ChannelScope;
use crate::handlers::HandlerSlot;
use crate::supervisor::{Channel, ChannelContext, FrameRouter};

/// Receives the frames of the active conversation.
pub trait ChatEvents: Send + Sync + 'static {
    fn on_message(&self, conversation_id: ConversationId, record: MessageRecord);

    fn on_read_ack(&self, conversation_id: ConversationId, message_id: MessageId);
}

struct ChatRouter {
    handler: Arc<HandlerSlot<dyn ChatEvents>>,
}

impl FrameRouter for ChatRouter {
    fn route(&self, scope: ChannelScope, frame: IncomingFrame) {
        let ChannelScope::Chat(conversation_id) = scope else {
            return;
        };
        let Some(handler) = self.handler.current() else {
            debug!(%conversation_id, kind = frame.kind(), "no chat handler, dropping frame");
            return;
        };
        match frame {
            IncomingFrame::Message(record) => {
                if let Some(other) = record.conversation
                    && other != conversation_id
                {
                    debug!(%conversation_id, %other, "message for another conversation, dropping");
                    return;
                }
                handler.on_message(conversation_id, record);
            }
            IncomingFrame::ReadAck { message_id } => handler.on_read_ack(conversation_id, message_id),
            other => debug!(%conversation_id, kind = other.kind(), "ignoring frame on chat channel"),
        }
    }
}

/// Socket client for one conversation at a time.
///
/// Connecting to a different conversation retires the previous socket before
/// the new one opens; frames still in flight for the old conversation are
/// never delivered. Dropping the client closes the socket.
pub struct ChatChannelClient {
    channel: Channel,
    handler: Arc<HandlerSlot<dyn ChatEvents>>,
}

impl ChatChannelClient {
    pub fn new(context: ChannelContext) -> Self {
        Self {
            channel: Channel::new(context),
            handler: Arc::new(HandlerSlot::new()),
        }
    }

    /// Replace the event handler. Takes effect for the next dispatched frame.
    pub fn set_handler(&self, handler: Arc<dyn ChatEvents>) {
        self.handler.set(handler);
    }

    pub fn clear_handler(&self) {
        self.handler.clear();
    }

    /// Connect to a persistent conversation.
    ///
    /// Drafts are rejected before any transport call. Connecting to the
    /// conversation that is already active does nothing.
    pub fn connect(&self, conversation: &Conversation) -> Result<(), HireloopError> {
        let Some(id) = conversation.id() else {
            return Err(HireloopError::DraftConversation {
                job_id: conversation.job_id().0,
            });
        };
        self.connect_to(id);
        Ok(())
    }

    /// Connect by conversation id. Returns false if `id` was already active.
    pub fn connect_to(&self, id: ConversationId) -> bool {
        let router = Arc::new(ChatRouter {
            handler: Arc::clone(&self.handler),
        });
        self.channel.start(ChannelScope::Chat(id), router)
    }

    /// Close the socket without retrying.
    pub fn disconnect(&self) {
        self.channel.stop();
    }

    /// Retry immediately after the reconnect budget was spent.
    pub fn reconnect(&self) {
        self.channel.reconnect();
    }

    /// Send a chat message. False, and nothing sent, unless connected.
    pub fn send_message(&self, content: &str) -> bool {
        self.channel.send(&OutgoingFrame::message(content))
    }

    /// Send a read marker. False, and nothing sent, unless connected.
    pub fn send_read(&self, message_id: MessageId) -> bool {
        self.channel.send(&OutgoingFrame::read(message_id))
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

    pub fn active_conversation(&self) -> Option<ConversationId> {
        match self.channel.scope() {
            Some(ChannelScope::Chat(id)) => Some(id),
            _ => None,
        }
    }
}
