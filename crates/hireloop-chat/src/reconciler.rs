// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merges REST history and live frames into one view of a conversation.
//!
//! Confirmed messages are keyed by server id, so the rendered order depends
//! only on ids and never on whether a message arrived by fetch or by socket.
//! Status merges go through [`MessageStatus::advance`] and cannot regress.
//! The unread count is derived from the map on every call.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use hireloop_core::{ConversationId, Message, MessageId, MessageRecord, MessageStatus, Viewer};

/// A message composed locally and not yet echoed back by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub local_id: u64,
    pub content: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Reconciler {
    viewer: Viewer,
    conversation_id: Option<ConversationId>,
    confirmed: BTreeMap<MessageId, Message>,
    /// Acks that arrived before their message.
    early_acks: HashSet<MessageId>,
    outbox: VecDeque<PendingMessage>,
    /// Read markers sent (or to be sent) but not yet acknowledged.
    pending_reads: BTreeSet<MessageId>,
    next_local: u64,
}

impl Reconciler {
    pub fn new(viewer: Viewer, conversation_id: Option<ConversationId>) -> Self {
        Self {
            viewer,
            conversation_id,
            confirmed: BTreeMap::new(),
            early_acks: HashSet::new(),
            outbox: VecDeque::new(),
            pending_reads: BTreeSet::new(),
            next_local: 1,
        }
    }

    pub fn viewer(&self) -> Viewer {
        self.viewer
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    /// Bind to the server id a draft was promoted to.
    pub fn set_conversation(&mut self, id: ConversationId) {
        self.conversation_id = Some(id);
    }

    /// Merge fetched history. Messages already present are kept and only
    /// their status can advance. Returns how many were new.
    pub fn seed(&mut self, history: impl IntoIterator<Item = MessageRecord>) -> usize {
        history
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Insert one message by id. Returns false for duplicates and for
    /// messages tagged with another conversation.
    pub fn insert(&mut self, record: MessageRecord) -> bool {
        if let Some(expected) = self.conversation_id
            && let Some(actual) = record.conversation
            && expected != actual
        {
            debug!(%expected, %actual, message_id = %record.id, "message for another conversation");
            return false;
        }

        let from_viewer = record.sender == self.viewer.user_id;
        let mut message = Message::from_record(record, &self.viewer);
        if self.early_acks.remove(&message.id) {
            message.status = message.status.advance(MessageStatus::Read);
            self.pending_reads.remove(&message.id);
        }

        match self.confirmed.entry(message.id) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.status = existing.status.advance(message.status);
                if existing.sent_at.is_none() {
                    existing.sent_at = message.sent_at;
                }
                if existing.sender_name.is_none() {
                    existing.sender_name = message.sender_name;
                }
                false
            }
            Entry::Vacant(entry) => {
                if from_viewer {
                    confirm_outgoing(&mut self.outbox, &message.content);
                }
                entry.insert(message);
                true
            }
        }
    }

    /// Apply a `read_ack`. Acks for unknown ids are held until the message
    /// arrives. Returns true if a present message was updated.
    pub fn apply_read_ack(&mut self, id: MessageId) -> bool {
        self.pending_reads.remove(&id);
        match self.confirmed.get_mut(&id) {
            Some(message) => {
                message.status = message.status.advance(MessageStatus::Read);
                true
            }
            None => {
                debug!(message_id = %id, "read ack before message, buffering");
                self.early_acks.insert(id);
                false
            }
        }
    }

    /// Record that the viewer has seen `id`. Returns true when a read marker
    /// should go out: the message is incoming, not yet read, and no marker
    /// is already pending. Status itself only changes on ack.
    pub fn mark_read(&mut self, id: MessageId) -> bool {
        let Some(message) = self.confirmed.get(&id) else {
            return false;
        };
        if message.sender == self.viewer.role || message.status == MessageStatus::Read {
            return false;
        }
        self.pending_reads.insert(id)
    }

    /// Read markers awaiting an ack, re-sent after a reconnect.
    pub fn pending_reads(&self) -> Vec<MessageId> {
        self.pending_reads.iter().copied().collect()
    }

    /// Queue an optimistic local entry and return its local id.
    pub fn push_outgoing(&mut self, content: impl Into<String>) -> u64 {
        let local_id = self.next_local;
        self.next_local += 1;
        self.outbox.push_back(PendingMessage {
            local_id,
            content: content.into(),
            queued_at: Utc::now(),
        });
        local_id
    }

    /// Drop a local entry whose send was refused.
    pub fn discard_outgoing(&mut self, local_id: u64) -> bool {
        match self.outbox.iter().position(|p| p.local_id == local_id) {
            Some(pos) => self.outbox.remove(pos).is_some(),
            None => false,
        }
    }

    /// Confirmed messages ordered by id.
    pub fn messages(&self) -> Vec<Message> {
        self.confirmed.values().cloned().collect()
    }

    /// Local entries in send order. Rendered after the confirmed messages.
    pub fn outgoing(&self) -> Vec<PendingMessage> {
        self.outbox.iter().cloned().collect()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.confirmed.get(&id)
    }

    /// Incoming messages not yet read.
    pub fn unread_count(&self) -> u32 {
        self.confirmed
            .values()
            .filter(|m| m.sender != self.viewer.role && m.status != MessageStatus::Read)
            .count() as u32
    }

    pub fn unread_ids(&self) -> Vec<MessageId> {
        self.confirmed
            .values()
            .filter(|m| m.sender != self.viewer.role && m.status != MessageStatus::Read)
            .map(|m| m.id)
            .collect()
    }

    /// Latest confirmed message, for list previews.
    pub fn last_message(&self) -> Option<&Message> {
        self.confirmed.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }
}

/// Server echo of one of our own messages replaces the oldest local copy.
fn confirm_outgoing(outbox: &mut VecDeque<PendingMessage>, content: &str) {
    if let Some(pos) = outbox.iter().position(|p| p.content == content) {
        outbox.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireloop_core::{Role, UserId};
    use proptest::prelude::*;

    const JOBSEEKER: u64 = 1;
    const RECRUITER: u64 = 2;

    fn viewer() -> Viewer {
        Viewer::new(UserId(JOBSEEKER), Role::Jobseeker)
    }

    fn rec(id: u64, sender: u64) -> MessageRecord {
        MessageRecord {
            id: MessageId(id),
            conversation: Some(ConversationId(501)),
            sender: UserId(sender),
            sender_name: None,
            content: format!("m{id}"),
            created_at: None,
            is_read: false,
            read_at: None,
            attachments: Vec::new(),
        }
    }

    fn read(id: u64, sender: u64) -> MessageRecord {
        MessageRecord {
            is_read: true,
            ..rec(id, sender)
        }
    }

    fn ids(r: &Reconciler) -> Vec<u64> {
        r.messages().iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn history_and_live_overlap_once() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        assert_eq!(r.seed(vec![rec(1, RECRUITER), rec(2, JOBSEEKER)]), 2);
        assert!(!r.insert(rec(2, JOBSEEKER)));
        assert!(r.insert(rec(3, RECRUITER)));
        assert_eq!(r.seed(vec![rec(1, RECRUITER), rec(3, RECRUITER)]), 0);
        assert_eq!(ids(&r), vec![1, 2, 3]);
    }

    #[test]
    fn late_history_sorts_before_live() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        r.insert(rec(10, RECRUITER));
        r.seed(vec![rec(7, RECRUITER), rec(8, JOBSEEKER)]);
        assert_eq!(ids(&r), vec![7, 8, 10]);
        assert_eq!(r.last_message().map(|m| m.id), Some(MessageId(10)));
    }

    #[test]
    fn foreign_conversation_is_ignored() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        let mut other = rec(1, RECRUITER);
        other.conversation = Some(ConversationId(999));
        assert!(!r.insert(other));
        assert!(r.is_empty());
    }

    #[test]
    fn unread_counts_incoming_only() {
        // Three unread recruiter messages plus one read jobseeker message.
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        r.seed(vec![
            rec(1, RECRUITER),
            rec(2, RECRUITER),
            rec(3, RECRUITER),
            read(4, JOBSEEKER),
        ]);
        assert_eq!(r.unread_count(), 3);

        assert!(r.apply_read_ack(MessageId(2)));
        assert_eq!(r.unread_count(), 2);
        assert_eq!(r.unread_ids(), vec![MessageId(1), MessageId(3)]);
    }

    #[test]
    fn own_messages_never_count() {
        let mut r = Reconciler::new(Viewer::new(UserId(RECRUITER), Role::Recruiter), None);
        r.seed(vec![rec(1, RECRUITER), rec(2, JOBSEEKER)]);
        assert_eq!(r.unread_count(), 1);
    }

    #[test]
    fn read_never_regresses() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        r.insert(read(5, RECRUITER));
        r.insert(rec(5, RECRUITER));
        assert_eq!(r.get(MessageId(5)).unwrap().status, MessageStatus::Read);

        r.seed(vec![rec(5, RECRUITER)]);
        assert_eq!(r.get(MessageId(5)).unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn early_ack_is_applied_on_arrival() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        assert!(!r.apply_read_ack(MessageId(9)));
        r.insert(rec(9, RECRUITER));
        assert_eq!(r.get(MessageId(9)).unwrap().status, MessageStatus::Read);
        assert_eq!(r.unread_count(), 0);
    }

    #[test]
    fn mark_read_is_optimistic_until_ack() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        r.seed(vec![rec(1, RECRUITER), rec(2, JOBSEEKER), read(3, RECRUITER)]);

        assert!(r.mark_read(MessageId(1)));
        assert!(!r.mark_read(MessageId(1)), "marker already pending");
        assert!(!r.mark_read(MessageId(2)), "own message");
        assert!(!r.mark_read(MessageId(3)), "already read");
        assert!(!r.mark_read(MessageId(99)), "unknown");

        assert_eq!(r.pending_reads(), vec![MessageId(1)]);
        assert_eq!(r.get(MessageId(1)).unwrap().status, MessageStatus::Delivered);
        assert_eq!(r.unread_count(), 1);

        r.apply_read_ack(MessageId(1));
        assert!(r.pending_reads().is_empty());
        assert_eq!(r.unread_count(), 0);
    }

    #[test]
    fn echo_confirms_oldest_matching_outgoing() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        let first = r.push_outgoing("Hi");
        let second = r.push_outgoing("Hi");
        r.push_outgoing("Bye");

        let mut echo = rec(20, JOBSEEKER);
        echo.content = "Hi".into();
        r.insert(echo);

        let left: Vec<_> = r.outgoing().iter().map(|p| p.local_id).collect();
        assert_eq!(left, vec![second, first + 2]);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn incoming_with_same_text_keeps_outgoing() {
        let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
        r.push_outgoing("ok");
        let mut incoming = rec(3, RECRUITER);
        incoming.content = "ok".into();
        r.insert(incoming);
        assert_eq!(r.outgoing().len(), 1);
    }

    #[test]
    fn discard_outgoing_removes_entry() {
        let mut r = Reconciler::new(viewer(), None);
        let id = r.push_outgoing("draft");
        assert!(r.discard_outgoing(id));
        assert!(!r.discard_outgoing(id));
        assert!(r.outgoing().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Input {
        Live(u64, bool),
        Ack(u64),
    }

    fn apply(r: &mut Reconciler, input: &Input) {
        match input {
            Input::Live(id, from_recruiter) => {
                let sender = if *from_recruiter { RECRUITER } else { JOBSEEKER };
                r.insert(rec(*id, sender));
            }
            Input::Ack(id) => {
                r.apply_read_ack(MessageId(*id));
            }
        }
    }

    fn inputs() -> impl Strategy<Value = Vec<Input>> {
        prop::collection::vec(
            prop_oneof![
                (0u64..20).prop_map(|id| Input::Live(id, id % 3 != 0)),
                (0u64..20).prop_map(Input::Ack),
            ],
            0..40,
        )
    }

    proptest! {
        #[test]
        fn each_id_appears_once(history in prop::collection::vec(0u64..30, 0..30),
                                live in prop::collection::vec(0u64..30, 0..30)) {
            let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
            r.seed(history.iter().map(|id| rec(*id, RECRUITER)));
            for id in &live {
                r.insert(rec(*id, RECRUITER));
            }
            let expected: BTreeSet<u64> = history.iter().chain(live.iter()).copied().collect();
            prop_assert_eq!(ids(&r), expected.into_iter().collect::<Vec<_>>());
        }

        #[test]
        fn status_only_advances(steps in inputs()) {
            let mut r = Reconciler::new(viewer(), Some(ConversationId(501)));
            let mut seen: BTreeMap<MessageId, MessageStatus> = BTreeMap::new();
            for step in &steps {
                apply(&mut r, step);
                for m in r.messages() {
                    if let Some(before) = seen.insert(m.id, m.status) {
                        prop_assert!(before <= m.status, "{:?} regressed from {before} to {}", m.id, m.status);
                    }
                }
            }
        }

        #[test]
        fn arrival_order_does_not_matter(
            (steps, shuffled) in inputs().prop_flat_map(|v| {
                let shuffled = Just(v.clone()).prop_shuffle();
                (Just(v), shuffled)
            })
        ) {
            let mut a = Reconciler::new(viewer(), Some(ConversationId(501)));
            let mut b = Reconciler::new(viewer(), Some(ConversationId(501)));
            for step in &steps {
                apply(&mut a, step);
            }
            for step in &shuffled {
                apply(&mut b, step);
            }
            prop_assert_eq!(a.messages(), b.messages());
            prop_assert_eq!(a.unread_count(), b.unread_count());
        }
    }
}
