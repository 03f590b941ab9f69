// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory REST collaborator.
//!
//! `MockMessagingApi` serves canned conversations, histories and counts, and
//! records every call so tests can assert on REST traffic.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use hireloop_core::traits::StartConversation;
use hireloop_core::types::Counterparty;
use hireloop_core::{
    ConversationId, ConversationSummary, HireloopError, JobId, MessageId, MessageRecord,
    MessagingApi, UserId,
};

use crate::lock;

/// One recorded REST call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListConversations,
    ConversationForJob(JobId),
    Messages(ConversationId),
    StartConversation(StartConversation),
    MarkConversationRead(ConversationId),
    UnreadNotificationsCount,
    MarkAllNotificationsRead,
}

struct ApiState {
    conversations: Vec<ConversationSummary>,
    histories: HashMap<ConversationId, Vec<MessageRecord>>,
    notifications_unread: u32,
    next_conversation_id: u64,
    next_message_id: u64,
    failing: bool,
    calls: Vec<ApiCall>,
}

/// REST collaborator backed by in-memory state.
pub struct MockMessagingApi {
    /// The authenticated user; authors the first message of started conversations.
    caller: UserId,
    state: Mutex<ApiState>,
}

impl MockMessagingApi {
    pub fn new(caller: UserId) -> Self {
        Self {
            caller,
            state: Mutex::new(ApiState {
                conversations: Vec::new(),
                histories: HashMap::new(),
                notifications_unread: 0,
                next_conversation_id: 900,
                next_message_id: 5000,
                failing: false,
                calls: Vec::new(),
            }),
        }
    }

    /// Add a conversation to the list (and to job lookups when it has a job).
    pub fn add_conversation(&self, summary: ConversationSummary) {
        lock(&self.state).conversations.push(summary);
    }

    /// Replace the history returned for a conversation.
    pub fn set_history(&self, id: ConversationId, records: Vec<MessageRecord>) {
        lock(&self.state).histories.insert(id, records);
    }

    /// Append one record to a conversation's history.
    pub fn push_history(&self, id: ConversationId, record: MessageRecord) {
        lock(&self.state)
            .histories
            .entry(id)
            .or_default()
            .push(record);
    }

    pub fn set_unread_count(&self, id: ConversationId, unread: u32) {
        let mut state = lock(&self.state);
        if let Some(summary) = state.conversations.iter_mut().find(|c| c.id == id) {
            summary.unread_count = unread;
        }
    }

    pub fn set_notifications_unread(&self, count: u32) {
        lock(&self.state).notifications_unread = count;
    }

    /// Id assigned to the next started conversation.
    pub fn set_next_conversation_id(&self, id: u64) {
        lock(&self.state).next_conversation_id = id;
    }

    /// Make every subsequent call fail with a 500.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: ApiCall) -> Result<std::sync::MutexGuard<'_, ApiState>, HireloopError> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.failing {
            return Err(HireloopError::Api {
                status: Some(500),
                message: "mock failure".into(),
                source: None,
            });
        }
        Ok(state)
    }
}

/// A minimal history record, handy for seeding conversations.
pub fn record(id: u64, conversation: u64, sender: u64, content: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId(id),
        conversation: Some(ConversationId(conversation)),
        sender: UserId(sender),
        sender_name: None,
        content: content.to_string(),
        created_at: None,
        is_read: false,
        read_at: None,
        attachments: Vec::new(),
    }
}

/// A minimal list entry.
pub fn summary(id: u64, job: u64, other_user: u64) -> ConversationSummary {
    ConversationSummary {
        id: ConversationId(id),
        job_id: Some(JobId(job)),
        other_user: Some(Counterparty {
            id: Some(UserId(other_user)),
            name: None,
            job: None,
        }),
        last_message: None,
        last_message_time: None,
        unread_count: 0,
        is_blocked: false,
    }
}

#[async_trait]
impl MessagingApi for MockMessagingApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, HireloopError> {
        let state = self.record(ApiCall::ListConversations)?;
        Ok(state.conversations.clone())
    }

    async fn conversation_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Option<ConversationSummary>, HireloopError> {
        let state = self.record(ApiCall::ConversationForJob(job_id))?;
        Ok(state
            .conversations
            .iter()
            .find(|c| c.job_id == Some(job_id))
            .cloned())
    }

    async fn messages(&self, id: ConversationId) -> Result<Vec<MessageRecord>, HireloopError> {
        let state = self.record(ApiCall::Messages(id))?;
        Ok(state.histories.get(&id).cloned().unwrap_or_default())
    }

    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<ConversationSummary, HireloopError> {
        let mut state = self.record(ApiCall::StartConversation(request.clone()))?;
        let id = ConversationId(state.next_conversation_id);
        state.next_conversation_id += 1;
        let message_id = state.next_message_id;
        state.next_message_id += 1;

        let now = Utc::now();
        let mut first = record(message_id, id.0, self.caller.0, &request.content);
        first.created_at = Some(now);
        state.histories.insert(id, vec![first]);

        let mut created = summary(id.0, request.job_id.0, request.recipient_id.0);
        created.last_message = Some(request.content);
        created.last_message_time = Some(now);
        state.conversations.insert(0, created.clone());
        Ok(created)
    }

    async fn mark_conversation_read(&self, id: ConversationId) -> Result<(), HireloopError> {
        let mut state = self.record(ApiCall::MarkConversationRead(id))?;
        if let Some(summary) = state.conversations.iter_mut().find(|c| c.id == id) {
            summary.unread_count = 0;
        }
        Ok(())
    }

    async fn unread_notifications_count(&self) -> Result<u32, HireloopError> {
        let state = self.record(ApiCall::UnreadNotificationsCount)?;
        Ok(state.notifications_unread)
    }

    async fn mark_all_notifications_read(&self) -> Result<(), HireloopError> {
        let mut state = self.record(ApiCall::MarkAllNotificationsRead)?;
        state.notifications_unread = 0;
        Ok(())
    }
}
