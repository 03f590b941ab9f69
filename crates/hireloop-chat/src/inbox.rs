// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation list view model.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::debug;

use hireloop_core::{
    ConversationId, ConversationSummary, HireloopError, JobId, MessageId, MessagingApi,
    UnreadEvent, Viewer,
};

/// Conversations of the viewer, most recent activity first.
///
/// Seeded from the REST list and kept current by unread events. Each message
/// id bumps a conversation's unread count at most once.
#[derive(Debug, Clone)]
pub struct Inbox {
    viewer: Viewer,
    entries: Vec<ConversationSummary>,
    counted: HashMap<ConversationId, HashSet<MessageId>>,
}

impl Inbox {
    pub fn new(viewer: Viewer) -> Self {
        Self {
            viewer,
            entries: Vec::new(),
            counted: HashMap::new(),
        }
    }

    pub async fn load(viewer: Viewer, api: &dyn MessagingApi) -> Result<Self, HireloopError> {
        let mut inbox = Self::new(viewer);
        inbox.refresh(api).await?;
        Ok(inbox)
    }

    /// Refetch the list. Server counts replace everything counted locally.
    pub async fn refresh(&mut self, api: &dyn MessagingApi) -> Result<(), HireloopError> {
        let list = api.list_conversations().await?;
        debug!(count = list.len(), "conversation list refreshed");
        self.replace(list);
        Ok(())
    }

    pub fn replace(&mut self, list: Vec<ConversationSummary>) {
        self.entries = list;
        self.counted.clear();
        self.sort();
    }

    /// Apply a push. Returns false for events from the viewer and for
    /// conversations not in the list (a refresh picks those up).
    pub fn apply_unread_event(
        &mut self,
        event: &UnreadEvent,
        active: Option<ConversationId>,
    ) -> bool {
        if event.sender_id == self.viewer.user_id {
            return false;
        }
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|c| c.id == event.conversation_id)
        else {
            debug!(conversation_id = %event.conversation_id, "unread event for unknown conversation");
            return false;
        };

        let at = event.created_at.unwrap_or_else(Utc::now);
        if entry.last_message_time.is_none_or(|t| t < at) {
            entry.last_message_time = Some(at);
        }
        if active != Some(event.conversation_id)
            && self
                .counted
                .entry(event.conversation_id)
                .or_default()
                .insert(event.message_id)
        {
            entry.unread_count += 1;
        }
        self.sort();
        true
    }

    pub fn mark_read(&mut self, id: ConversationId) {
        if let Some(entry) = self.entries.iter_mut().find(|c| c.id == id) {
            entry.unread_count = 0;
        }
        self.counted.remove(&id);
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.entries
    }

    pub fn get(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.entries.iter().find(|c| c.id == id)
    }

    pub fn find_by_job(&self, job_id: JobId) -> Option<&ConversationSummary> {
        self.entries.iter().find(|c| c.job_id == Some(job_id))
    }

    pub fn total_unread(&self) -> u32 {
        self.entries.iter().map(|c| c.unread_count).sum()
    }

    fn sort(&mut self) {
        // `None < Some`, so undated entries sink to the bottom.
        self.entries
            .sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    }
}
