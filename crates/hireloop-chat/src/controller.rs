// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! View model for one mounted conversation.
//!
//! The controller owns a [`ChatChannelClient`] and a [`Reconciler`] and keeps
//! them pointed at the same conversation. Each `open` starts a new generation;
//! history fetches and promotions that finish after the view moved on are
//! discarded, and socket events are checked against the active conversation
//! before they touch any state.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hireloop_core::traits::StartConversation;
use hireloop_core::{
    ConnectionState, Conversation, ConversationId, DraftConversation, HireloopError, JobId,
    Message, MessageId, MessageRecord, MessagingApi, PersistentConversation, UserId, Viewer,
};

use crate::chat::{ChatChannelClient, ChatEvents};
use crate::reconciler::{PendingMessage, Reconciler};
use crate::supervisor::{lock, ChannelContext};

/// Result of [`ConversationController::send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open socket, or the draft was started over REST.
    Sent,
    /// Not connected; nothing was sent and composition should be disabled.
    Disconnected,
    /// The conversation is blocked.
    Blocked,
    /// Only whitespace.
    Empty,
}

/// Everything the UI renders for the mounted conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub conversation: Option<Conversation>,
    pub messages: Vec<Message>,
    pub outgoing: Vec<PendingMessage>,
    pub unread: u32,
    pub connection: ConnectionState,
}

impl ConversationSnapshot {
    fn empty() -> Self {
        Self {
            conversation: None,
            messages: Vec::new(),
            outgoing: Vec::new(),
            unread: 0,
            connection: ConnectionState::Idle,
        }
    }

    /// Whether the composer should accept input. Drafts can always be sent,
    /// since the first message goes over REST.
    pub fn can_compose(&self) -> bool {
        match &self.conversation {
            None => false,
            Some(c) if c.is_blocked() => false,
            Some(Conversation::Draft(_)) => true,
            Some(Conversation::Persistent(_)) => self.connection.is_open(),
        }
    }
}

struct ControllerState {
    conversation: Option<Conversation>,
    reconciler: Reconciler,
    generation: u64,
    /// Generation whose channel has already reported `Open` once.
    opened_generation: Option<u64>,
}

struct ControllerInner {
    viewer: Viewer,
    api: Arc<dyn MessagingApi>,
    chat: ChatChannelClient,
    state: Mutex<ControllerState>,
    snapshot: watch::Sender<ConversationSnapshot>,
    cancel: CancellationToken,
}

pub struct ConversationController {
    inner: Arc<ControllerInner>,
}

impl ConversationController {
    /// Must be called inside a tokio runtime.
    pub fn new(viewer: Viewer, api: Arc<dyn MessagingApi>, context: ChannelContext) -> Self {
        let inner = Arc::new(ControllerInner {
            viewer,
            api,
            chat: ChatChannelClient::new(context),
            state: Mutex::new(ControllerState {
                conversation: None,
                reconciler: Reconciler::new(viewer, None),
                generation: 0,
                opened_generation: None,
            }),
            snapshot: watch::channel(ConversationSnapshot::empty()).0,
            cancel: CancellationToken::new(),
        });
        inner.chat.set_handler(Arc::new(ControllerEvents {
            inner: Arc::downgrade(&inner),
        }));
        tokio::spawn(watch_connection(
            Arc::downgrade(&inner),
            inner.chat.watch_state(),
            inner.cancel.clone(),
        ));
        Self { inner }
    }

    /// Show `conversation`, replacing whatever was mounted.
    ///
    /// Persistent conversations connect first and then fetch history, so
    /// nothing sent in between is missed. Drafts have no socket.
    pub async fn open(&self, conversation: Conversation) -> Result<(), HireloopError> {
        let generation = {
            let mut state = lock(&self.inner.state);
            state.generation += 1;
            state.reconciler = Reconciler::new(self.inner.viewer, conversation.id());
            state.conversation = Some(conversation.clone());
            state.opened_generation = None;
            state.generation
        };

        match conversation.id() {
            Some(id) => {
                debug!(conversation_id = %id, generation, "opening conversation");
                if !self.inner.chat.connect_to(id) && self.inner.chat.connected() {
                    let mut state = lock(&self.inner.state);
                    if state.generation == generation {
                        state.opened_generation = Some(generation);
                    }
                }
            }
            None => {
                debug!(job_id = %conversation.job_id(), "opening draft conversation");
                self.inner.chat.disconnect();
            }
        }
        self.inner.publish();

        if let Some(id) = conversation.id() {
            self.inner.load_history(id, generation).await?;
        }
        Ok(())
    }

    /// Open the conversation for a job, or a draft if none exists yet.
    pub async fn open_for_job(
        &self,
        job_id: JobId,
        other_user_id: UserId,
    ) -> Result<Conversation, HireloopError> {
        let draft = DraftConversation {
            job_id,
            other_user_id,
        };
        let conversation = match self.inner.api.conversation_for_job(job_id).await? {
            Some(summary) => {
                Conversation::Persistent(PersistentConversation::from_summary(summary, draft))
            }
            None => Conversation::Draft(draft),
        };
        self.open(conversation.clone()).await?;
        Ok(conversation)
    }

    /// Send `content` in the mounted conversation.
    ///
    /// A draft is started over REST with `content` as its first message and
    /// then behaves as a persistent conversation. Transport problems are not
    /// errors; they come back as [`SendOutcome::Disconnected`].
    pub async fn send_message(&self, content: &str) -> Result<SendOutcome, HireloopError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(SendOutcome::Empty);
        }

        let (conversation, generation) = {
            let state = lock(&self.inner.state);
            (state.conversation.clone(), state.generation)
        };
        let Some(conversation) = conversation else {
            return Err(HireloopError::SessionClosed);
        };
        if conversation.is_blocked() {
            return Ok(SendOutcome::Blocked);
        }

        match conversation {
            Conversation::Draft(draft) => self.promote(draft, content, generation).await,
            Conversation::Persistent(_) => {
                let local_id = lock(&self.inner.state).reconciler.push_outgoing(content);
                if self.inner.chat.send_message(content) {
                    self.inner.publish();
                    return Ok(SendOutcome::Sent);
                }
                lock(&self.inner.state).reconciler.discard_outgoing(local_id);
                debug!("send refused, channel not connected");
                Ok(SendOutcome::Disconnected)
            }
        }
    }

    async fn promote(
        &self,
        draft: DraftConversation,
        content: &str,
        generation: u64,
    ) -> Result<SendOutcome, HireloopError> {
        let summary = self
            .inner
            .api
            .start_conversation(StartConversation {
                job_id: draft.job_id,
                recipient_id: draft.other_user_id,
                content: content.to_string(),
            })
            .await?;
        let persistent = PersistentConversation::from_summary(summary, draft);
        let id = persistent.id;

        {
            let mut state = lock(&self.inner.state);
            if state.generation != generation {
                debug!(conversation_id = %id, "view changed while starting conversation");
                return Ok(SendOutcome::Sent);
            }
            state.conversation = Some(Conversation::Persistent(persistent));
            state.reconciler.set_conversation(id);
        }
        info!(conversation_id = %id, job_id = %draft.job_id, "draft conversation started");

        self.inner.chat.connect_to(id);
        self.inner.publish();
        self.inner.load_history(id, generation).await?;
        Ok(SendOutcome::Sent)
    }

    /// Mark an incoming message as seen. Returns true if a read marker went
    /// out now; otherwise a pending marker is sent once the channel opens.
    pub fn mark_read(&self, message_id: MessageId) -> bool {
        if !lock(&self.inner.state).reconciler.mark_read(message_id) {
            return false;
        }
        self.inner.chat.send_read(message_id)
    }

    /// Mark every unread incoming message as seen. Returns how many markers
    /// were queued.
    pub fn mark_all_read(&self) -> usize {
        let ids = {
            let mut state = lock(&self.inner.state);
            let unread = state.reconciler.unread_ids();
            unread
                .into_iter()
                .filter(|id| state.reconciler.mark_read(*id))
                .collect::<Vec<_>>()
        };
        for id in &ids {
            if !self.inner.chat.send_read(*id) {
                break;
            }
        }
        ids.len()
    }

    /// Local block toggle. Blocked conversations refuse composition.
    pub fn set_blocked(&self, blocked: bool) -> bool {
        let applied = match lock(&self.inner.state).conversation.as_mut() {
            Some(Conversation::Persistent(c)) => {
                c.is_blocked = blocked;
                true
            }
            _ => false,
        };
        if applied {
            self.inner.publish();
        }
        applied
    }

    /// Unmount the conversation and close its socket.
    pub fn close(&self) {
        {
            let mut state = lock(&self.inner.state);
            state.generation += 1;
            state.conversation = None;
            state.reconciler = Reconciler::new(self.inner.viewer, None);
            state.opened_generation = None;
        }
        self.inner.chat.disconnect();
        self.inner.publish();
    }

    /// Retry the socket after the reconnect budget was spent.
    pub fn reconnect(&self) {
        self.inner.chat.reconnect();
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        lock(&self.inner.state)
            .conversation
            .as_ref()
            .and_then(Conversation::id)
    }

    pub fn connected(&self) -> bool {
        self.inner.chat.connected()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConversationSnapshot> {
        self.inner.snapshot.subscribe()
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        self.inner.chat.clear_handler();
        self.inner.chat.disconnect();
    }
}

impl ControllerInner {
    async fn load_history(&self, id: ConversationId, generation: u64) -> Result<(), HireloopError> {
        let history = self.api.messages(id).await?;
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                debug!(conversation_id = %id, "view changed during history fetch, dropping");
                return Ok(());
            }
            let added = state.reconciler.seed(history);
            debug!(conversation_id = %id, added, "history merged");
        }
        self.publish();
        Ok(())
    }

    async fn on_open(&self) {
        let (id, generation, reopened) = {
            let mut state = lock(&self.state);
            let Some(id) = state.conversation.as_ref().and_then(Conversation::id) else {
                return;
            };
            if self.chat.active_conversation() != Some(id) {
                return;
            }
            let reopened = state.opened_generation == Some(state.generation);
            state.opened_generation = Some(state.generation);
            (id, state.generation, reopened)
        };

        if reopened {
            info!(conversation_id = %id, "channel reopened, refetching history");
            if let Err(e) = self.load_history(id, generation).await {
                warn!(conversation_id = %id, error = %e, "history refetch failed");
            }
        }
        self.flush_reads();
    }

    /// Re-send read markers that never got an ack.
    fn flush_reads(&self) {
        let pending = lock(&self.state).reconciler.pending_reads();
        if !pending.is_empty() {
            debug!(count = pending.len(), "re-sending read markers");
        }
        for id in pending {
            if !self.chat.send_read(id) {
                break;
            }
        }
    }

    fn publish(&self) {
        let snapshot = {
            let state = lock(&self.state);
            ConversationSnapshot {
                conversation: state.conversation.clone(),
                messages: state.reconciler.messages(),
                outgoing: state.reconciler.outgoing(),
                unread: state.reconciler.unread_count(),
                connection: self.chat.state(),
            }
        };
        self.snapshot.send_replace(snapshot);
    }
}

/// Republishes on every connection change and resyncs after a reconnect.
async fn watch_connection(
    inner: Weak<ControllerInner>,
    mut states: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = states.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
        let state = *states.borrow_and_update();
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.publish();
        if state.is_open() {
            inner.on_open().await;
        }
    }
}

/// Routes socket frames into the reconciler of the active conversation.
struct ControllerEvents {
    inner: Weak<ControllerInner>,
}

impl ControllerEvents {
    fn apply(&self, conversation_id: ConversationId, f: impl FnOnce(&mut Reconciler)) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        {
            let mut state = lock(&inner.state);
            if state.reconciler.conversation_id() != Some(conversation_id) {
                debug!(%conversation_id, "event for inactive conversation, dropping");
                return;
            }
            f(&mut state.reconciler);
        }
        inner.publish();
    }
}

impl ChatEvents for ControllerEvents {
    fn on_message(&self, conversation_id: ConversationId, record: MessageRecord) {
        self.apply(conversation_id, |r| {
            r.insert(record);
        });
    }

    fn on_read_ack(&self, conversation_id: ConversationId, message_id: MessageId) {
        self.apply(conversation_id, |r| {
            r.apply_read_ack(message_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireloop_core::Role;
    use hireloop_test_utils::{MockMessagingApi, MockTransport, StaticTokens};

    use crate::endpoints::WsEndpoints;

    fn controller() -> (ConversationController, MockTransport) {
        let transport = MockTransport::auto_accept();
        let context = ChannelContext::new(
            Arc::new(transport.clone()),
            Arc::new(StaticTokens::new("tok")),
            WsEndpoints::new("ws://chat.test"),
        );
        let viewer = Viewer::new(UserId(1), Role::Jobseeker);
        let api = Arc::new(MockMessagingApi::new(UserId(1)));
        (ConversationController::new(viewer, api, context), transport)
    }

    #[tokio::test]
    async fn send_without_conversation_is_session_closed() {
        let (controller, _) = controller();
        assert!(matches!(
            controller.send_message("hi").await,
            Err(HireloopError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn whitespace_is_not_sent() {
        let (controller, transport) = controller();
        assert_eq!(controller.send_message("   ").await.unwrap(), SendOutcome::Empty);
        assert_eq!(transport.open_count(), 0);
    }

    #[test]
    fn compose_rules() {
        let mut snapshot = ConversationSnapshot::empty();
        assert!(!snapshot.can_compose());

        snapshot.conversation = Some(Conversation::Draft(DraftConversation {
            job_id: JobId(1),
            other_user_id: UserId(2),
        }));
        assert!(snapshot.can_compose());

        let mut persistent = PersistentConversation {
            id: ConversationId(5),
            job_id: JobId(1),
            other_user_id: UserId(2),
            is_blocked: false,
            last_message: None,
            last_message_time: None,
        };
        snapshot.conversation = Some(Conversation::Persistent(persistent.clone()));
        assert!(!snapshot.can_compose());
        snapshot.connection = ConnectionState::Open;
        assert!(snapshot.can_compose());

        persistent.is_blocked = true;
        snapshot.conversation = Some(Conversation::Persistent(persistent));
        assert!(!snapshot.can_compose());
    }
}
