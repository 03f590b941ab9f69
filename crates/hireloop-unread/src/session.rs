// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login-scoped binding of an [`UnreadStore`] to the notification channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hireloop_chat::{ChannelContext, UnreadChannelClient, UnreadEvents};
use hireloop_config::UnreadConfig;
use hireloop_core::{
    ConnectionState, ConversationId, HireloopError, MessagingApi, UnreadEvent, Viewer,
};

use crate::store::{UnreadStore, UnreadTotals};

/// Forwards pushes into the store until the session ends.
struct StoreForwarder {
    store: Arc<UnreadStore>,
    cancel: CancellationToken,
}

impl UnreadEvents for StoreForwarder {
    fn on_unread_event(&self, event: UnreadEvent) {
        if self.cancel.is_cancelled() {
            debug!(conversation_id = %event.conversation_id, "session ended, dropping unread event");
            return;
        }
        self.store.apply_event(&event);
    }
}

/// One login session: the notification socket plus the store it feeds.
///
/// Logout must call [`shutdown`](Self::shutdown) so no counts survive into
/// the next session. Dropping the session stops its socket and tasks but
/// leaves the store untouched.
pub struct UnreadSession {
    viewer: Viewer,
    store: Arc<UnreadStore>,
    api: Arc<dyn MessagingApi>,
    channel: UnreadChannelClient,
    cancel: CancellationToken,
}

impl UnreadSession {
    /// Start a session for `viewer`: reset the store, fetch counts over REST,
    /// then open the notification channel.
    pub async fn start(
        viewer: Viewer,
        store: Arc<UnreadStore>,
        api: Arc<dyn MessagingApi>,
        context: ChannelContext,
        config: &UnreadConfig,
    ) -> Self {
        store.clear();
        store.set_viewer(Some(viewer.user_id));

        let session = Self {
            viewer,
            store,
            api,
            channel: UnreadChannelClient::new(context),
            cancel: CancellationToken::new(),
        };

        if let Err(e) = session.refresh().await {
            warn!(error = %e, "initial unread fetch failed");
        }

        session.channel.set_handler(Arc::new(StoreForwarder {
            store: Arc::clone(&session.store),
            cancel: session.cancel.clone(),
        }));
        session.channel.connect();

        if config.poll_fallback {
            tokio::spawn(poll_while_down(
                Arc::clone(&session.store),
                Arc::clone(&session.api),
                session.channel.watch_state(),
                session.cancel.clone(),
                config.poll_after(),
                config.poll_interval(),
            ));
        }

        info!(user_id = %viewer.user_id, "unread session started");
        session
    }

    pub fn viewer(&self) -> Viewer {
        self.viewer
    }

    pub fn store(&self) -> &Arc<UnreadStore> {
        &self.store
    }

    /// Refetch conversation and notification counts over REST.
    pub async fn refresh(&self) -> Result<UnreadTotals, HireloopError> {
        refetch(&self.store, self.api.as_ref(), &self.cancel).await
    }

    /// Mark a conversation read on the server, then in the store.
    pub async fn mark_conversation_read(&self, id: ConversationId) -> Result<(), HireloopError> {
        self.api.mark_conversation_read(id).await?;
        if !self.cancel.is_cancelled() {
            self.store.mark_conversation_read(id);
        }
        Ok(())
    }

    /// Mark every notification read on the server, then in the store.
    pub async fn mark_all_notifications_read(&self) -> Result<(), HireloopError> {
        self.api.mark_all_notifications_read().await?;
        if !self.cancel.is_cancelled() {
            self.store.set_notifications_unread(0);
        }
        Ok(())
    }

    /// The conversation currently on screen, whose pushes are not counted.
    pub fn set_active_conversation(&self, id: Option<ConversationId>) {
        self.store.set_active_conversation(id);
    }

    pub fn channel_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn watch_channel(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    /// Retry the notification channel after its reconnect budget was spent.
    pub fn reconnect(&self) {
        self.channel.connect();
    }

    /// Logout: close the channel, stop background work and clear the store.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.channel.clear_handler();
        self.channel.close();
        self.store.clear();
        info!(user_id = %self.viewer.user_id, "unread session ended");
    }
}

impl Drop for UnreadSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.channel.close();
    }
}

async fn refetch(
    store: &UnreadStore,
    api: &dyn MessagingApi,
    cancel: &CancellationToken,
) -> Result<UnreadTotals, HireloopError> {
    let (conversations, notifications) =
        tokio::try_join!(api.list_conversations(), api.unread_notifications_count())?;
    if cancel.is_cancelled() {
        return Err(HireloopError::SessionClosed);
    }
    store.reset_from(&conversations);
    store.set_notifications_unread(notifications);
    let totals = store.totals();
    debug!(chat = totals.chat, notifications = totals.notifications, "unread counts refetched");
    Ok(totals)
}

/// Wait until the channel is (or is not) open. False once the channel is gone.
async fn wait_until(states: &mut watch::Receiver<ConnectionState>, open: bool) -> bool {
    states.wait_for(|s| s.is_open() == open).await.is_ok()
}

/// REST fallback: once the channel has been down for `after`, refetch every
/// `interval` until it reopens.
async fn poll_while_down(
    store: Arc<UnreadStore>,
    api: Arc<dyn MessagingApi>,
    mut states: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    after: Duration,
    interval: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            down = wait_until(&mut states, false) => if !down { return },
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            up = wait_until(&mut states, true) => {
                if !up {
                    return;
                }
                continue;
            }
            _ = tokio::time::sleep(after) => {}
        }

        info!(
            down_secs = after.as_secs(),
            interval_secs = interval.as_secs(),
            "notification channel down, polling unread counts"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                up = wait_until(&mut states, true) => {
                    if !up {
                        return;
                    }
                    info!("notification channel back, stopping unread poll");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = refetch(&store, api.as_ref(), &cancel).await {
                        warn!(error = %e, "unread poll failed (non-fatal)");
                    }
                }
            }
        }
    }
}
