// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use hireloop_core::{ConversationId, ConversationSummary, MessageId, UnreadEvent, UserId};

/// Published badge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadTotals {
    pub chat: u32,
    pub notifications: u32,
    pub total: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    viewer: Option<UserId>,
    active: Option<ConversationId>,
    /// Per-conversation counts from the last REST fetch.
    baseline: HashMap<ConversationId, u32>,
    /// Message ids pushed since that fetch.
    live: HashMap<ConversationId, HashSet<MessageId>>,
    notifications: u32,
}

impl StoreState {
    fn conversation_unread(&self, id: ConversationId) -> u32 {
        let live = self.live.get(&id).map_or(0, |ids| ids.len() as u32);
        self.baseline.get(&id).copied().unwrap_or(0) + live
    }

    fn totals(&self) -> UnreadTotals {
        let chat = self.baseline.values().sum::<u32>()
            + self.live.values().map(|ids| ids.len() as u32).sum::<u32>();
        UnreadTotals {
            chat,
            notifications: self.notifications,
            total: chat + self.notifications,
        }
    }
}

/// Unread counts shared by every badge in the process.
///
/// Created empty; an [`UnreadSession`](crate::UnreadSession) fills it at
/// login and clears it at logout. Subscribers see each change as soon as the
/// mutating call returns.
#[derive(Debug)]
pub struct UnreadStore {
    state: Mutex<StoreState>,
    totals: watch::Sender<UnreadTotals>,
}

impl Default for UnreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UnreadStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            totals: watch::channel(UnreadTotals::default()).0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let (result, totals) = {
            let mut state = self.lock();
            let result = f(&mut state);
            (result, state.totals())
        };
        self.totals.send_if_modified(|current| {
            if *current == totals {
                return false;
            }
            *current = totals;
            true
        });
        result
    }

    /// Events sent by this user are never counted.
    pub fn set_viewer(&self, viewer: Option<UserId>) {
        self.update(|s| s.viewer = viewer);
    }

    /// Events for the conversation on screen are not counted.
    pub fn set_active_conversation(&self, id: Option<ConversationId>) {
        self.update(|s| s.active = id);
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.lock().active
    }

    /// Count a pushed message. Returns false if it was ignored or already
    /// counted.
    pub fn apply_event(&self, event: &UnreadEvent) -> bool {
        self.update(|s| {
            if s.viewer == Some(event.sender_id) {
                debug!(message_id = %event.message_id, "own message, not counted");
                return false;
            }
            if s.active == Some(event.conversation_id) {
                debug!(conversation_id = %event.conversation_id, "conversation on screen, not counted");
                return false;
            }
            s.live
                .entry(event.conversation_id)
                .or_default()
                .insert(event.message_id)
        })
    }

    /// Replace chat counts with a REST snapshot.
    pub fn reset_from(&self, conversations: &[ConversationSummary]) {
        self.update(|s| {
            s.baseline = conversations
                .iter()
                .filter(|c| c.unread_count > 0)
                .map(|c| (c.id, c.unread_count))
                .collect();
            s.live.clear();
        });
    }

    pub fn set_notifications_unread(&self, count: u32) {
        self.update(|s| s.notifications = count);
    }

    /// Apply a completed mark-as-read call.
    pub fn mark_conversation_read(&self, id: ConversationId) {
        self.update(|s| {
            s.baseline.remove(&id);
            s.live.remove(&id);
        });
    }

    pub fn conversation_unread(&self, id: ConversationId) -> u32 {
        self.lock().conversation_unread(id)
    }

    pub fn totals(&self) -> UnreadTotals {
        *self.totals.borrow()
    }

    pub fn total_unread(&self) -> u32 {
        self.totals().total
    }

    pub fn subscribe(&self) -> watch::Receiver<UnreadTotals> {
        self.totals.subscribe()
    }

    /// Forget everything, including the viewer.
    pub fn clear(&self) {
        self.update(|s| *s = StoreState::default());
    }
}
