// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator consumed by the messaging core.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::HireloopError;
use crate::types::{ConversationId, ConversationSummary, JobId, MessageRecord, UserId};

/// Body of the first message that creates a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartConversation {
    pub job_id: JobId,
    pub recipient_id: UserId,
    pub content: String,
}

/// Conversation and notification endpoints of the backend.
#[async_trait]
pub trait MessagingApi: Send + Sync + 'static {
    /// All conversations of the authenticated user, most recent first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, HireloopError>;

    /// The conversation anchored to `job_id`, if one exists.
    async fn conversation_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Option<ConversationSummary>, HireloopError>;

    /// Message history of a conversation in server order.
    async fn messages(&self, id: ConversationId) -> Result<Vec<MessageRecord>, HireloopError>;

    /// Create a conversation by sending its first message.
    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<ConversationSummary, HireloopError>;

    /// Mark every message in a conversation as read.
    async fn mark_conversation_read(&self, id: ConversationId) -> Result<(), HireloopError>;

    /// Number of unread generic notifications.
    async fn unread_notifications_count(&self) -> Result<u32, HireloopError>;

    /// Mark all generic notifications as read.
    async fn mark_all_notifications_read(&self) -> Result<(), HireloopError>;
}
