// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tokio-tungstenite` implementation of the socket transport.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use hireloop_core::traits::{
    redact_token, CloseInfo, Connection, Transport, TransportEvent, TransportHandle,
};

/// Close code for a normal client-initiated close.
const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the peer closed without a status.
const NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle flag shared by a handle and its connection task.
#[derive(Debug, Default)]
struct SocketState(AtomicU8);

impl SocketState {
    /// Move to open unless a close already happened. Returns false if closed.
    fn mark_open(&self) -> bool {
        self.0
            .compare_exchange(CONNECTING, OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn mark_closed(&self) {
        self.0.store(CLOSED, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst) == OPEN
    }
}

enum Command {
    Text(String),
    Close,
}

/// Opens WebSocket connections with `connect_async`. TLS uses the bundled
/// webpki roots.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> Connection {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(SocketState::default());

        tokio::spawn(run_connection(
            url.to_string(),
            Arc::clone(&state),
            command_rx,
            event_tx,
        ));

        Connection {
            handle: Box::new(WsHandle {
                commands: command_tx,
                state,
            }),
            events,
        }
    }
}

struct WsHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<SocketState>,
}

impl TransportHandle for WsHandle {
    fn send_text(&self, text: String) {
        if self.is_open() {
            let _ = self.commands.send(Command::Text(text));
        }
    }

    fn close(&self) {
        self.state.mark_closed();
        let _ = self.commands.send(Command::Close);
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

async fn run_connection(
    url: String,
    state: Arc<SocketState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let redacted = redact_token(&url);
    debug!(url = %redacted, "opening socket");

    // A close requested before the handshake finishes abandons it.
    let handshake = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = wait_for_close(&mut commands) => {
            let _ = events.send(TransportEvent::Close(CloseInfo::new(
                Some(NORMAL_CLOSURE),
                "closed before handshake",
            )));
            return;
        }
    };

    let mut stream = match handshake {
        Ok((stream, _response)) => stream,
        Err(tungstenite::Error::Http(response)) => {
            let status = response.status().as_u16();
            warn!(url = %redacted, status, "socket handshake rejected");
            let _ = events.send(TransportEvent::Error(format!(
                "handshake rejected with HTTP {status}"
            )));
            let _ = events.send(TransportEvent::Close(CloseInfo::new(
                Some(status),
                "handshake rejected",
            )));
            return;
        }
        Err(e) => {
            debug!(url = %redacted, error = %e, "socket handshake failed");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Close(CloseInfo::new(None, e.to_string())));
            return;
        }
    };

    // close() may have landed after the handshake resolved.
    if !state.mark_open() {
        let _ = stream.close(None).await;
        let _ = events.send(TransportEvent::Close(CloseInfo::new(
            Some(NORMAL_CLOSURE),
            "closed before handshake",
        )));
        return;
    }
    let _ = events.send(TransportEvent::Open);

    let (mut sink, mut source) = stream.split();
    let close = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break CloseInfo::new(Some(ABNORMAL_CLOSURE), e.to_string());
                    }
                }
                // The handle was closed or dropped.
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    break CloseInfo::new(Some(NORMAL_CLOSURE), "closed by client");
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => {
                            CloseInfo::new(Some(u16::from(frame.code)), frame.reason.as_str())
                        }
                        None => CloseInfo::new(Some(NO_STATUS), ""),
                    };
                }
                // Binary frames are ignored; ping/pong is answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break CloseInfo::new(Some(ABNORMAL_CLOSURE), e.to_string());
                }
                None => break CloseInfo::new(Some(ABNORMAL_CLOSURE), "stream ended"),
            },
        }
    };

    state.mark_closed();
    debug!(url = %redacted, code = ?close.code, reason = %close.reason, "socket closed");
    let _ = events.send(TransportEvent::Close(close));
}

/// Resolves once a close is requested or the handle is dropped. Text queued
/// before the handshake is discarded.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_before_open_wins() {
        let state = SocketState::default();
        state.mark_closed();
        assert!(!state.mark_open());
        assert!(!state.is_open());
    }

    #[test]
    fn open_then_close() {
        let state = SocketState::default();
        assert!(!state.is_open());
        assert!(state.mark_open());
        assert!(state.is_open());
        state.mark_closed();
        assert!(!state.is_open());
        assert!(!state.mark_open());
    }
}
