// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel lifecycle tests against the mock transport: socket ownership,
//! sends while disconnected, reconnect with backoff and token refresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::time::Instant;

use hireloop_chat::{
    ChannelContext, ChatChannelClient, ChatEvents, ReconnectPolicy, UnreadChannelClient,
    WsEndpoints,
};
use hireloop_core::types::PersistentConversation;
use hireloop_core::{
    ConnectionState, Conversation, ConversationId, JobId, MessageId, MessageRecord, UserId,
};
use hireloop_test_utils::{MockTransport, StaticTokens};

fn context(transport: &MockTransport, tokens: Arc<StaticTokens>) -> ChannelContext {
    ChannelContext::new(
        Arc::new(transport.clone()),
        tokens,
        WsEndpoints::new("ws://chat.test"),
    )
    .with_policy(ReconnectPolicy {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        max_attempts: 3,
    })
}

fn persistent(id: u64) -> Conversation {
    Conversation::Persistent(PersistentConversation {
        id: ConversationId(id),
        job_id: JobId(42),
        other_user_id: UserId(7),
        is_blocked: false,
        last_message: None,
        last_message_time: None,
    })
}

async fn wait_for(client: &ChatChannelClient, f: impl Fn(&ConnectionState) -> bool) {
    client.watch_state().wait_for(|s| f(s)).await.unwrap();
}

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<(ConversationId, MessageId)>>,
}

impl ChatEvents for Recorder {
    fn on_message(&self, conversation_id: ConversationId, record: MessageRecord) {
        self.messages.lock().unwrap().push((conversation_id, record.id));
    }

    fn on_read_ack(&self, _conversation_id: ConversationId, _message_id: MessageId) {}
}

#[tokio::test(start_paused = true)]
async fn no_send_while_disconnected() {
    let transport = MockTransport::new();
    let client = ChatChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));

    // Never connected.
    assert!(!client.send_message("hello"));
    assert!(!client.send_read(MessageId(1)));

    // Handshake still pending.
    client.connect(&persistent(501)).unwrap();
    let socket = transport.wait_for_socket(1).await;
    assert!(!client.connected());
    assert!(!client.send_message("hello"));

    // Open, then dropped by the server.
    socket.accept();
    wait_for(&client, |s| s.is_open()).await;
    socket.drop_with(Some(1006), "abnormal");
    assert!(!client.send_message("hello"));

    assert!(socket.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn switching_conversations_keeps_one_socket() {
    let transport = MockTransport::auto_accept();
    let client = ChatChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));
    let recorder = Arc::new(Recorder::default());
    client.set_handler(recorder.clone());

    client.connect(&persistent(501)).unwrap();
    let a = transport.wait_for_socket(1).await;
    wait_for(&client, |s| s.is_open()).await;

    // A frame already queued on A must not surface after the switch.
    a.push_json(json!({"type": "message", "id": 1, "sender": 7, "content": "late"}));
    client.connect(&persistent(502)).unwrap();
    assert!(a.closed_by_client(), "A is closed before connect returns");

    let b = transport.wait_for_socket(2).await;
    wait_for(&client, |s| s.is_open()).await;
    b.push_json(json!({"type": "message", "id": 2, "sender": 7, "content": "fresh"}));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(transport.open_count(), 2);
    assert_eq!(transport.live_sockets().len(), 1);
    assert_eq!(b.url(), "ws://chat.test/ws/chat/502/?token=tok");
    assert_eq!(client.active_conversation(), Some(ConversationId(502)));
    assert_eq!(
        *recorder.messages.lock().unwrap(),
        vec![(ConversationId(502), MessageId(2))]
    );

    assert!(client.send_message("to B"));
    assert_eq!(b.sent_json(), vec![json!({"content": "to B"})]);
    assert!(a.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconnects_once_after_drop() {
    let transport = MockTransport::auto_accept();
    let client = ChatChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));
    client.connect(&persistent(501)).unwrap();
    let first = transport.wait_for_socket(1).await;
    wait_for(&client, |s| s.is_open()).await;

    first.drop_with(Some(1006), "abnormal");
    assert!(!client.connected(), "connected flips false on the drop itself");

    wait_for(&client, |s| *s == ConnectionState::Reconnecting { attempt: 1 }).await;
    let dropped_at = Instant::now();
    let second = transport.wait_for_socket(2).await;
    assert!(dropped_at.elapsed() >= Duration::from_secs(1));
    wait_for(&client, |s| s.is_open()).await;

    assert_eq!(second.url(), first.url());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 2);
    assert!(client.connected());
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_then_fails_until_manual_reconnect() {
    let transport = MockTransport::new();
    let client = ChatChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));
    client.connect(&persistent(501)).unwrap();

    let start = Instant::now();
    let mut opened_at = Vec::new();
    for n in 1..=4 {
        let socket = transport.wait_for_socket(n).await;
        opened_at.push(start.elapsed());
        socket.fail("connection refused");
    }
    wait_for(&client, |s| *s == ConnectionState::Failed).await;

    // Initial attempt, then 1s, 2s and 4s waits.
    let gaps: Vec<_> = opened_at.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(transport.open_count(), 4);
    assert_eq!(client.state(), ConnectionState::Failed);

    client.reconnect();
    let socket = transport.wait_for_socket(5).await;
    socket.accept();
    wait_for(&client, |s| s.is_open()).await;
    assert!(client.connected());
}

#[tokio::test(start_paused = true)]
async fn expired_token_reconnects_with_refresh() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(
        StaticTokens::with_expiry("tok", Some(Utc::now() + chrono::Duration::minutes(5)))
            .refreshed_lifetime(Duration::from_secs(3600)),
    );
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();
    let first = transport.wait_for_socket(1).await;
    wait_for(&client, |s| s.is_open()).await;

    let second = transport.wait_for_socket(2).await;
    assert!(first.closed_by_client());
    assert_eq!(tokens.refresh_count(), 1);
    assert_eq!(second.url(), "ws://chat.test/ws/chat/501/?token=tok-r1");
    wait_for(&client, |s| s.is_open()).await;
}

#[tokio::test(start_paused = true)]
async fn refreshed_token_already_expired_backs_off() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(
        StaticTokens::with_expiry("tok", Some(Utc::now() - chrono::Duration::seconds(10)))
            .refreshed_lifetime(Duration::ZERO),
    );
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();

    wait_for(&client, |s| *s == ConnectionState::Reconnecting { attempt: 1 }).await;
    assert_eq!(tokens.refresh_count(), 1);

    // One refresh per backoff step, never a socket with a dead token.
    wait_for(&client, |s| *s == ConnectionState::Failed).await;
    assert_eq!(tokens.refresh_count(), 4);
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn short_lived_tokens_count_as_failures() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(
        StaticTokens::with_expiry("tok", Some(Utc::now() + chrono::Duration::milliseconds(500)))
            .refreshed_lifetime(Duration::from_millis(200)),
    );
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();
    transport.wait_for_socket(1).await;

    let started = Instant::now();
    wait_for(&client, |s| *s == ConnectionState::Failed).await;
    // Each reopen waited out the backoff: 1s, 2s, 4s.
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(transport.open_count(), 4);
    assert_eq!(tokens.refresh_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn stale_token_is_refreshed_before_connect() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(StaticTokens::with_expiry(
        "tok",
        Some(Utc::now() - chrono::Duration::minutes(1)),
    ));
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();

    let socket = transport.wait_for_socket(1).await;
    assert_eq!(socket.url(), "ws://chat.test/ws/chat/501/?token=tok-r1");
    assert_eq!(tokens.refresh_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_forces_refresh() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(StaticTokens::new("tok"));
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();
    let first = transport.wait_for_socket(1).await;
    wait_for(&client, |s| s.is_open()).await;

    first.drop_with(Some(4001), "token rejected");
    let second = transport.wait_for_socket(2).await;
    assert_eq!(tokens.refresh_count(), 1);
    assert_eq!(second.url(), "ws://chat.test/ws/chat/501/?token=tok-r1");
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_counts_as_attempt() {
    let transport = MockTransport::auto_accept();
    let tokens = Arc::new(StaticTokens::new("tok"));
    let client = ChatChannelClient::new(context(&transport, tokens.clone()));
    client.connect(&persistent(501)).unwrap();
    let first = transport.wait_for_socket(1).await;
    wait_for(&client, |s| s.is_open()).await;

    tokens.fail_refresh(true);
    first.drop_with(Some(4001), "token rejected");
    wait_for(&client, |s| *s == ConnectionState::Failed).await;
    assert_eq!(transport.open_count(), 1);

    tokens.fail_refresh(false);
    client.reconnect();
    transport.wait_for_socket(2).await;
    wait_for(&client, |s| s.is_open()).await;
}

#[tokio::test(start_paused = true)]
async fn notification_channel_reconnects_and_closes() {
    let transport = MockTransport::auto_accept();
    let client = UnreadChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));
    client.connect();
    let first = transport.wait_for_socket(1).await;
    client.watch_state().wait_for(|s| s.is_open()).await.unwrap();

    first.drop_with(None, "eof");
    let second = transport.wait_for_socket(2).await;
    assert_eq!(second.url(), "ws://chat.test/ws/user/notifications/?token=tok");
    client.watch_state().wait_for(|s| s.is_open()).await.unwrap();

    client.close();
    assert!(second.closed_by_client());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropping_client_closes_socket() {
    let transport = MockTransport::auto_accept();
    let client = ChatChannelClient::new(context(&transport, Arc::new(StaticTokens::new("tok"))));
    client.connect(&persistent(501)).unwrap();
    let socket = transport.wait_for_socket(1).await;
    drop(client);
    assert!(socket.closed_by_client());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 1);
}
