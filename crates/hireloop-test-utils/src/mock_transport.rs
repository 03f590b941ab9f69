// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock socket transport for deterministic channel tests.
//!
//! Every `open` call is recorded as a [`MockSocket`], the server side of that
//! connection. Tests drive the handshake (`accept`), push frames, and drop the
//! connection with any close code, then assert on what the client sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use hireloop_core::traits::{CloseInfo, Connection, Transport, TransportEvent, TransportHandle};

use crate::lock;

/// A transport that never touches the network.
#[derive(Clone)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
    opened: Arc<watch::Sender<usize>>,
    auto_accept: bool,
}

impl MockTransport {
    /// Handshakes stay pending until [`MockSocket::accept`] is called.
    pub fn new() -> Self {
        Self {
            sockets: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(watch::channel(0).0),
            auto_accept: false,
        }
    }

    /// Every opened connection reports `Open` immediately.
    pub fn auto_accept() -> Self {
        Self {
            auto_accept: true,
            ..Self::new()
        }
    }

    /// URLs passed to `open`, in call order.
    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.sockets).iter().map(|s| s.url.clone()).collect()
    }

    /// Number of `open` calls so far.
    pub fn open_count(&self) -> usize {
        lock(&self.sockets).len()
    }

    /// Server side of the `index`-th opened connection.
    pub fn socket(&self, index: usize) -> Option<MockSocket> {
        lock(&self.sockets).get(index).cloned()
    }

    /// Server side of the most recently opened connection.
    pub fn last_socket(&self) -> Option<MockSocket> {
        lock(&self.sockets).last().cloned()
    }

    /// Connections the client has not closed and the server has not dropped.
    pub fn live_sockets(&self) -> Vec<MockSocket> {
        lock(&self.sockets)
            .iter()
            .filter(|s| !s.is_finished())
            .cloned()
            .collect()
    }

    /// Wait until at least `count` connections have been opened and return
    /// the last one.
    pub async fn wait_for_socket(&self, count: usize) -> MockSocket {
        let mut opened = self.opened.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = opened.wait_for(|n| *n >= count).await;
        lock(&self.sockets)[count - 1].clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> Connection {
        let (events_tx, events) = mpsc::unbounded_channel();
        let socket = MockSocket {
            url: url.to_string(),
            events: events_tx,
            shared: Arc::new(SocketShared::default()),
        };
        if self.auto_accept {
            socket.accept();
        }

        let handle = MockHandle {
            socket: socket.clone(),
        };
        let count = {
            let mut sockets = lock(&self.sockets);
            sockets.push(socket);
            sockets.len()
        };
        self.opened.send_replace(count);

        Connection {
            handle: Box::new(handle),
            events,
        }
    }
}

#[derive(Default)]
struct SocketShared {
    open: AtomicBool,
    finished: AtomicBool,
    closed_by_client: AtomicBool,
    sent: Mutex<Vec<String>>,
}

/// Server side of one mock connection.
#[derive(Clone)]
pub struct MockSocket {
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    shared: Arc<SocketShared>,
}

impl MockSocket {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete the handshake.
    pub fn accept(&self) {
        if self.is_finished() {
            return;
        }
        self.shared.open.store(true, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Open);
    }

    /// Deliver one raw text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        if !self.is_finished() {
            let _ = self.events.send(TransportEvent::Message(text.into()));
        }
    }

    /// Deliver one JSON frame to the client.
    pub fn push_json(&self, frame: serde_json::Value) {
        self.push_text(frame.to_string());
    }

    /// Drop the connection from the server side with the given close code.
    pub fn drop_with(&self, code: Option<u16>, reason: &str) {
        if self.shared.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.open.store(false, Ordering::SeqCst);
        let _ = self
            .events
            .send(TransportEvent::Close(CloseInfo::new(code, reason)));
    }

    /// Fail the connection: an `Error` event followed by an abnormal close.
    pub fn fail(&self, message: &str) {
        if self.is_finished() {
            return;
        }
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
        self.drop_with(Some(1006), message);
    }

    /// Text frames the client sent while the connection was open.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.shared.sent).clone()
    }

    /// Sent frames parsed as JSON. Unparseable frames are skipped.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// True once either side has closed the connection.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    pub fn closed_by_client(&self) -> bool {
        self.shared.closed_by_client.load(Ordering::SeqCst)
    }
}

struct MockHandle {
    socket: MockSocket,
}

impl TransportHandle for MockHandle {
    fn send_text(&self, text: String) {
        if self.socket.is_open() {
            lock(&self.socket.shared.sent).push(text);
        }
    }

    fn close(&self) {
        let shared = &self.socket.shared;
        if shared.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        shared.closed_by_client.store(true, Ordering::SeqCst);
        shared.open.store(false, Ordering::SeqCst);
        let _ = self
            .socket
            .events
            .send(TransportEvent::Close(CloseInfo::new(Some(1000), "closed by client")));
    }

    fn is_open(&self) -> bool {
        self.socket.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireloop_core::frames::OutgoingFrame;
    use hireloop_core::MessageId;

    #[tokio::test]
    async fn records_urls_and_scripted_events() {
        let transport = MockTransport::new();
        let mut conn = transport.open("ws://h/ws/chat/1/?token=a");
        assert_eq!(transport.opened_urls(), vec!["ws://h/ws/chat/1/?token=a"]);

        let socket = transport.last_socket().unwrap();
        socket.accept();
        socket.push_text("hello");
        socket.drop_with(Some(1006), "gone");

        assert_eq!(conn.events.recv().await, Some(TransportEvent::Open));
        assert_eq!(
            conn.events.recv().await,
            Some(TransportEvent::Message("hello".into()))
        );
        assert_eq!(
            conn.events.recv().await,
            Some(TransportEvent::Close(CloseInfo::new(Some(1006), "gone")))
        );
        assert!(!conn.handle.is_open());
    }

    #[tokio::test]
    async fn sends_are_captured_only_while_open() {
        let transport = MockTransport::new();
        let conn = transport.open("ws://h/x");
        let socket = transport.last_socket().unwrap();

        conn.handle.send(&OutgoingFrame::message("early"));
        socket.accept();
        conn.handle.send(&OutgoingFrame::read(MessageId(4)));

        assert_eq!(socket.sent(), vec![r#"{"type":"read","message_id":4}"#]);
    }

    #[tokio::test]
    async fn client_close_is_idempotent() {
        let transport = MockTransport::auto_accept();
        let mut conn = transport.open("ws://h/x");
        assert_eq!(conn.events.recv().await, Some(TransportEvent::Open));

        conn.handle.close();
        conn.handle.close();
        assert!(transport.last_socket().unwrap().closed_by_client());
        assert!(matches!(
            conn.events.recv().await,
            Some(TransportEvent::Close(_))
        ));
        assert!(conn.events.try_recv().is_err());
        assert!(transport.live_sockets().is_empty());
    }

    #[tokio::test]
    async fn wait_for_socket_resolves_after_open() {
        let transport = MockTransport::new();
        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.wait_for_socket(2).await.url().to_string() })
        };
        let _a = transport.open("ws://h/1");
        let _b = transport.open("ws://h/2");
        assert_eq!(waiter.await.unwrap(), "ws://h/2");
    }
}
