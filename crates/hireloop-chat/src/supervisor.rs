// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel supervisor shared by the chat and notification clients.
//!
//! A [`Channel`] owns at most one driver task at a time. The driver opens the
//! transport, forwards frames to a [`FrameRouter`], and on an unexpected close
//! reconnects with bounded exponential backoff:
//!
//! ```text
//! Idle -> Connecting -> Open --drop--> Reconnecting{1} -> Connecting -> ...
//!                         \                         \--budget spent--> Failed
//!                          \--stop()--> Closed
//! ```
//!
//! Every driver runs under an epoch taken from the client's [`ActiveSlot`].
//! Starting a new driver or stopping the channel bumps the epoch, after which
//! the old driver can neither publish state nor dispatch frames.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hireloop_core::frames::{IncomingFrame, OutgoingFrame};
use hireloop_core::traits::{redact_token, Connection, Transport, TransportEvent, TransportHandle};
use hireloop_core::{AccessToken, ConnectionState, HireloopError, TokenProvider};

use crate::backoff::ReconnectPolicy;
use crate::endpoints::{ChannelScope, WsEndpoints};

/// Collaborators shared by every channel client.
#[derive(Clone)]
pub struct ChannelContext {
    pub transport: Arc<dyn Transport>,
    pub tokens: Arc<dyn TokenProvider>,
    pub endpoints: WsEndpoints,
    pub policy: ReconnectPolicy,
}

impl ChannelContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        endpoints: WsEndpoints,
    ) -> Self {
        Self {
            transport,
            tokens,
            endpoints,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Receives the parsed frames of one channel.
pub(crate) trait FrameRouter: Send + Sync + 'static {
    fn route(&self, scope: ChannelScope, frame: IncomingFrame);
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Epoch of the current driver plus the published connection state.
pub(crate) struct ActiveSlot {
    epoch: Mutex<u64>,
    state: watch::Sender<ConnectionState>,
}

impl ActiveSlot {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            state: watch::channel(ConnectionState::Idle).0,
        }
    }

    /// Supersede any running driver and return the new epoch.
    pub(crate) fn begin(&self) -> u64 {
        let mut epoch = lock(&self.epoch);
        *epoch += 1;
        *epoch
    }

    /// Supersede any running driver and publish `Closed`.
    pub(crate) fn retire(&self) {
        let mut epoch = lock(&self.epoch);
        *epoch += 1;
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Publish `state` if `epoch` is still current. Returns false for a stale epoch.
    pub(crate) fn publish(&self, epoch: u64, state: ConnectionState) -> bool {
        let current = lock(&self.epoch);
        if *current != epoch {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        *lock(&self.epoch) == epoch
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

type LiveHandle = Arc<Mutex<Option<Arc<dyn TransportHandle>>>>;

/// Control side of a running driver.
struct ActiveDriver {
    scope: ChannelScope,
    cancel: CancellationToken,
    reconnect: Arc<Notify>,
    live: LiveHandle,
}

impl ActiveDriver {
    /// Cancel the driver and close its socket before returning.
    fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = lock(&self.live).take() {
            handle.close();
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.live).as_ref().is_some_and(|h| h.is_open())
    }
}

/// One logical socket scope with at most one live driver.
pub(crate) struct Channel {
    context: ChannelContext,
    slot: Arc<ActiveSlot>,
    active: Mutex<Option<ActiveDriver>>,
}

impl Channel {
    pub(crate) fn new(context: ChannelContext) -> Self {
        Self {
            context,
            slot: Arc::new(ActiveSlot::new()),
            active: Mutex::new(None),
        }
    }

    pub(crate) fn scope(&self) -> Option<ChannelScope> {
        lock(&self.active).as_ref().map(|d| d.scope)
    }

    /// Run a driver for `scope`, retiring the previous one first. Returns
    /// false without touching the transport if `scope` is already active.
    pub(crate) fn start(&self, scope: ChannelScope, router: Arc<dyn FrameRouter>) -> bool {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|d| d.scope == scope) {
            return false;
        }
        if let Some(previous) = active.take() {
            debug!(from = %previous.scope, to = %scope, "switching channel scope");
            previous.stop();
        }

        let epoch = self.slot.begin();
        let driver = ActiveDriver {
            scope,
            cancel: CancellationToken::new(),
            reconnect: Arc::new(Notify::new()),
            live: Arc::new(Mutex::new(None)),
        };
        self.slot.publish(epoch, ConnectionState::Connecting);

        let task = Driver {
            scope,
            epoch,
            context: self.context.clone(),
            slot: Arc::clone(&self.slot),
            router,
            cancel: driver.cancel.clone(),
            reconnect: Arc::clone(&driver.reconnect),
            live: Arc::clone(&driver.live),
        };
        tokio::spawn(task.run());
        *active = Some(driver);
        true
    }

    /// Intentional close: no retry follows.
    pub(crate) fn stop(&self) {
        if let Some(driver) = lock(&self.active).take() {
            debug!(scope = %driver.scope, "closing channel");
            driver.stop();
            self.slot.retire();
        }
    }

    /// Retry now after the budget was spent or while waiting out a backoff.
    pub(crate) fn reconnect(&self) {
        if !matches!(
            self.state(),
            ConnectionState::Failed | ConnectionState::Reconnecting { .. }
        ) {
            return;
        }
        if let Some(driver) = lock(&self.active).as_ref() {
            driver.reconnect.notify_one();
        }
    }

    /// Send `frame` if the socket is open. Never blocks and never fails loudly.
    pub(crate) fn send(&self, frame: &OutgoingFrame) -> bool {
        if !self.slot.state().is_open() {
            return false;
        }
        let handle = match lock(&self.active).as_ref() {
            Some(driver) => lock(&driver.live).clone(),
            None => None,
        };
        match handle {
            Some(handle) if handle.is_open() => {
                handle.send(frame);
                true
            }
            _ => false,
        }
    }

    /// True only while the published state is `Open` and the socket itself is open.
    pub(crate) fn connected(&self) -> bool {
        self.slot.state().is_open() && lock(&self.active).as_ref().is_some_and(|d| d.is_open())
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.slot.state()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.slot.subscribe()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How one connection ended.
enum Ended {
    Cancelled,
    /// The access token outlived its lifetime while open. `lived` is the
    /// time since the socket opened.
    Expired { lived: Duration },
    Dropped { opened: bool, auth_rejected: bool },
}

struct Driver {
    scope: ChannelScope,
    epoch: u64,
    context: ChannelContext,
    slot: Arc<ActiveSlot>,
    router: Arc<dyn FrameRouter>,
    cancel: CancellationToken,
    reconnect: Arc<Notify>,
    live: LiveHandle,
}

impl Driver {
    async fn run(self) {
        let mut failures: u32 = 0;
        let mut refresh = false;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            match self.token(refresh).await {
                Ok(token) => {
                    match self.connect_once(&token).await {
                        Ended::Cancelled => return,
                        Ended::Expired { lived } => {
                            refresh = true;
                            // A token that expires faster than the next backoff
                            // delay counts as a failed attempt.
                            let floor = self
                                .context
                                .policy
                                .delay_for(failures + 1)
                                .unwrap_or(self.context.policy.max_delay);
                            if lived >= floor {
                                failures = 0;
                                continue;
                            }
                            warn!(
                                scope = %self.scope,
                                lived_ms = lived.as_millis() as u64,
                                "access token expired right after opening"
                            );
                        }
                        Ended::Dropped {
                            opened,
                            auth_rejected,
                        } => {
                            if opened {
                                failures = 0;
                            }
                            refresh = auth_rejected;
                        }
                    }
                }
                Err(e) => {
                    warn!(scope = %self.scope, error = %e, "no usable access token for socket");
                }
            }

            failures += 1;
            match self.context.policy.delay_for(failures) {
                Some(delay) => {
                    if !self.publish(ConnectionState::Reconnecting { attempt: failures }) {
                        return;
                    }
                    info!(
                        scope = %self.scope,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        refresh,
                        "channel dropped, reconnecting after backoff"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.reconnect.notified() => failures = 0,
                    }
                }
                None => {
                    if !self.publish(ConnectionState::Failed) {
                        return;
                    }
                    warn!(
                        scope = %self.scope,
                        attempts = failures - 1,
                        "reconnect budget exhausted, waiting for manual reconnect"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = self.reconnect.notified() => {
                            info!(scope = %self.scope, "manual reconnect");
                            failures = 0;
                        }
                    }
                }
            }
        }
    }

    /// The token for the next handshake. Expired tokens are refreshed first;
    /// a refresh that yields an already expired token is an error.
    async fn token(&self, refresh: bool) -> Result<AccessToken, HireloopError> {
        if !refresh {
            let token = self.context.tokens.access_token().await?;
            if !token.is_expired(Utc::now()) {
                return Ok(token);
            }
            debug!(scope = %self.scope, "access token already expired");
        }
        let token = self.context.tokens.refresh().await?;
        if token.is_expired(Utc::now()) {
            return Err(HireloopError::Auth(
                "refreshed access token is already expired".to_string(),
            ));
        }
        Ok(token)
    }

    async fn connect_once(&self, token: &AccessToken) -> Ended {
        let url = self
            .scope
            .url(&self.context.endpoints, token.secret.expose_secret());
        if !self.publish(ConnectionState::Connecting) {
            return Ended::Cancelled;
        }
        debug!(scope = %self.scope, url = %redact_token(&url), "opening channel");

        let Connection { handle, mut events } = self.context.transport.open(&url);
        let handle: Arc<dyn TransportHandle> = Arc::from(handle);
        *lock(&self.live) = Some(Arc::clone(&handle));
        // stop() may have run before the handle was visible to it.
        if self.cancel.is_cancelled() {
            handle.close();
            return Ended::Cancelled;
        }

        let expiry = token.time_to_expiry(Utc::now());
        let expiry_timer = tokio::time::sleep(expiry.unwrap_or_default());
        tokio::pin!(expiry_timer);
        let mut opened_at: Option<Instant> = None;

        let ended = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Ended::Cancelled,
                _ = &mut expiry_timer, if opened_at.is_some() && expiry.is_some() => {
                    info!(scope = %self.scope, "access token expired, reconnecting with a fresh token");
                    let lived = opened_at.map(|at| at.elapsed()).unwrap_or_default();
                    break Ended::Expired { lived };
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Open) => {
                        opened_at = Some(Instant::now());
                        if !self.publish(ConnectionState::Open) {
                            break Ended::Cancelled;
                        }
                        info!(scope = %self.scope, "channel open");
                    }
                    Some(TransportEvent::Message(raw)) => self.dispatch(&raw),
                    Some(TransportEvent::Error(e)) => {
                        debug!(scope = %self.scope, error = %e, "transport error");
                    }
                    Some(TransportEvent::Close(close)) => {
                        info!(
                            scope = %self.scope,
                            code = ?close.code,
                            reason = %close.reason,
                            "channel closed by peer"
                        );
                        break Ended::Dropped {
                            opened: opened_at.is_some(),
                            auth_rejected: close.is_auth_rejection(),
                        };
                    }
                    None => break Ended::Dropped {
                        opened: opened_at.is_some(),
                        auth_rejected: false,
                    },
                },
            }
        };

        lock(&self.live).take();
        handle.close();
        ended
    }

    fn dispatch(&self, raw: &str) {
        if !self.slot.is_current(self.epoch) {
            debug!(scope = %self.scope, "dropping frame for retired channel");
            return;
        }
        match IncomingFrame::parse(raw) {
            Ok(frame) => self.router.route(self.scope, frame),
            Err(e) => warn!(scope = %self.scope, error = %e, "dropping malformed frame"),
        }
    }

    fn publish(&self, state: ConnectionState) -> bool {
        let current = self.slot.publish(self.epoch, state);
        if !current {
            debug!(scope = %self.scope, %state, "stale driver, not publishing state");
        }
        current
    }
}
