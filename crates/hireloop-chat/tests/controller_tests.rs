// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation controller scenarios: draft promotion, unread recompute,
//! optimistic sends and resync after a reconnect.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use hireloop_chat::{
    ChannelContext, ConversationController, ConversationSnapshot, ReconnectPolicy, SendOutcome,
    WsEndpoints,
};
use hireloop_core::traits::StartConversation;
use hireloop_core::types::{DraftConversation, PersistentConversation};
use hireloop_core::{
    Conversation, ConversationId, JobId, MessageId, MessageStatus, Role, UserId, Viewer,
};
use hireloop_test_utils::{record, summary, ApiCall, MockMessagingApi, MockTransport, StaticTokens};

const JOBSEEKER: u64 = 1;
const RECRUITER: u64 = 7;

struct Harness {
    controller: ConversationController,
    api: Arc<MockMessagingApi>,
    transport: MockTransport,
}

fn harness(transport: MockTransport) -> Harness {
    let api = Arc::new(MockMessagingApi::new(UserId(JOBSEEKER)));
    let context = ChannelContext::new(
        Arc::new(transport.clone()),
        Arc::new(StaticTokens::new("tok")),
        WsEndpoints::new("ws://chat.test"),
    )
    .with_policy(ReconnectPolicy {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        max_attempts: 4,
    });
    let controller = ConversationController::new(
        Viewer::new(UserId(JOBSEEKER), Role::Jobseeker),
        api.clone(),
        context,
    );
    Harness {
        controller,
        api,
        transport,
    }
}

fn persistent(id: u64) -> Conversation {
    Conversation::Persistent(PersistentConversation {
        id: ConversationId(id),
        job_id: JobId(42),
        other_user_id: UserId(RECRUITER),
        is_blocked: false,
        last_message: None,
        last_message_time: None,
    })
}

async fn wait_snapshot(
    controller: &ConversationController,
    f: impl Fn(&ConversationSnapshot) -> bool,
) -> ConversationSnapshot {
    let mut rx = controller.watch();
    let snapshot = tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| f(s)))
        .await
        .expect("snapshot condition not reached")
        .unwrap()
        .clone();
    snapshot
}

async fn eventually(mut f: impl FnMut() -> bool) {
    for _ in 0..500 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn draft_is_promoted_on_first_send() {
    let h = harness(MockTransport::auto_accept());
    h.api.set_next_conversation_id(501);

    let draft = Conversation::Draft(DraftConversation {
        job_id: JobId(42),
        other_user_id: UserId(RECRUITER),
    });
    h.controller.open(draft).await.unwrap();
    assert_eq!(h.transport.open_count(), 0);
    assert!(h.controller.snapshot().can_compose());

    let outcome = h.controller.send_message("Hello").await.unwrap();
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(
        h.api.count_calls(|c| *c
            == ApiCall::StartConversation(StartConversation {
                job_id: JobId(42),
                recipient_id: UserId(RECRUITER),
                content: "Hello".into(),
            })),
        1
    );
    assert_eq!(h.controller.conversation_id(), Some(ConversationId(501)));

    let socket = h.transport.wait_for_socket(1).await;
    assert_eq!(socket.url(), "ws://chat.test/ws/chat/501/?token=tok");
    let snapshot = wait_snapshot(&h.controller, |s| s.connection.is_open()).await;
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "Hello");

    // Everything after promotion goes over the 501 socket.
    socket.push_json(json!({
        "type": "message", "id": 5001, "conversation": 501, "sender": RECRUITER, "content": "Hi!"
    }));
    wait_snapshot(&h.controller, |s| s.messages.len() == 2).await;
    assert_eq!(h.controller.send_message("Again").await.unwrap(), SendOutcome::Sent);
    assert!(h.controller.mark_read(MessageId(5001)));
    assert_eq!(
        socket.sent_json(),
        vec![
            json!({"content": "Again"}),
            json!({"type": "read", "message_id": 5001})
        ]
    );
    assert_eq!(h.api.count_calls(|c| matches!(c, ApiCall::StartConversation(_))), 1);
}

#[tokio::test(start_paused = true)]
async fn unread_count_follows_read_acks() {
    let h = harness(MockTransport::auto_accept());
    let mut own = record(4, 501, JOBSEEKER, "mine");
    own.is_read = true;
    h.api.set_history(
        ConversationId(501),
        vec![
            record(1, 501, RECRUITER, "a"),
            record(2, 501, RECRUITER, "b"),
            record(3, 501, RECRUITER, "c"),
            own,
        ],
    );

    h.controller.open(persistent(501)).await.unwrap();
    assert_eq!(h.controller.snapshot().unread, 3);

    let socket = h.transport.wait_for_socket(1).await;
    socket.push_json(json!({"type": "read_ack", "message_id": 2}));
    let snapshot = wait_snapshot(&h.controller, |s| s.unread == 2).await;
    let status = snapshot
        .messages
        .iter()
        .find(|m| m.id == MessageId(2))
        .map(|m| m.status);
    assert_eq!(status, Some(MessageStatus::Read));
}

#[tokio::test(start_paused = true)]
async fn optimistic_send_is_confirmed_by_echo() {
    let h = harness(MockTransport::auto_accept());
    h.controller.open(persistent(501)).await.unwrap();
    let socket = h.transport.wait_for_socket(1).await;
    wait_snapshot(&h.controller, |s| s.connection.is_open()).await;

    assert_eq!(h.controller.send_message("  Hi  ").await.unwrap(), SendOutcome::Sent);
    assert_eq!(socket.sent_json(), vec![json!({"content": "Hi"})]);
    let pending = h.controller.snapshot();
    assert_eq!(pending.outgoing.len(), 1);
    assert_eq!(pending.outgoing[0].content, "Hi");

    socket.push_json(json!({
        "type": "message", "id": 10, "conversation": 501, "sender": JOBSEEKER, "content": "Hi"
    }));
    let confirmed = wait_snapshot(&h.controller, |s| s.outgoing.is_empty()).await;
    assert_eq!(confirmed.messages.len(), 1);
    assert_eq!(confirmed.unread, 0);
}

#[tokio::test(start_paused = true)]
async fn send_refused_while_connecting() {
    let h = harness(MockTransport::new());
    h.controller.open(persistent(501)).await.unwrap();
    let socket = h.transport.wait_for_socket(1).await;

    assert_eq!(
        h.controller.send_message("Hi").await.unwrap(),
        SendOutcome::Disconnected
    );
    assert!(h.controller.snapshot().outgoing.is_empty());
    assert!(!h.controller.snapshot().can_compose());
    assert!(socket.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blocked_conversation_refuses_composition() {
    let h = harness(MockTransport::auto_accept());
    h.controller.open(persistent(501)).await.unwrap();
    let socket = h.transport.wait_for_socket(1).await;
    wait_snapshot(&h.controller, |s| s.connection.is_open()).await;

    assert!(h.controller.set_blocked(true));
    assert!(!h.controller.snapshot().can_compose());
    assert_eq!(h.controller.send_message("Hi").await.unwrap(), SendOutcome::Blocked);
    assert!(socket.sent().is_empty());

    h.controller.set_blocked(false);
    assert_eq!(h.controller.send_message("Hi").await.unwrap(), SendOutcome::Sent);
}

#[tokio::test(start_paused = true)]
async fn reconnect_refetches_history_and_resends_reads() {
    let h = harness(MockTransport::auto_accept());
    h.api.set_history(ConversationId(501), vec![record(1, 501, RECRUITER, "first")]);
    h.controller.open(persistent(501)).await.unwrap();
    let first = h.transport.wait_for_socket(1).await;
    wait_snapshot(&h.controller, |s| s.connection.is_open()).await;

    assert!(h.controller.mark_read(MessageId(1)));
    assert_eq!(first.sent_json(), vec![json!({"type": "read", "message_id": 1})]);

    // Missed while the socket was down.
    h.api.push_history(ConversationId(501), record(2, 501, RECRUITER, "missed"));
    first.drop_with(Some(1006), "abnormal");

    let second = h.transport.wait_for_socket(2).await;
    let snapshot = wait_snapshot(&h.controller, |s| s.messages.len() == 2).await;
    assert_eq!(snapshot.unread, 2, "read stays optimistic until acked");
    eventually(|| !second.sent().is_empty()).await;
    assert_eq!(second.sent_json(), vec![json!({"type": "read", "message_id": 1})]);
    assert_eq!(h.api.count_calls(|c| *c == ApiCall::Messages(ConversationId(501))), 2);
}

#[tokio::test(start_paused = true)]
async fn switching_drops_previous_conversation_state() {
    let h = harness(MockTransport::auto_accept());
    h.api.set_history(ConversationId(501), vec![record(1, 501, RECRUITER, "a")]);
    h.api.set_history(ConversationId(502), vec![record(9, 502, RECRUITER, "b")]);

    h.controller.open(persistent(501)).await.unwrap();
    let a = h.transport.wait_for_socket(1).await;
    h.controller.open(persistent(502)).await.unwrap();
    assert!(a.closed_by_client());

    let b = h.transport.wait_for_socket(2).await;
    b.push_json(json!({"type": "message", "id": 10, "conversation": 502, "sender": RECRUITER, "content": "c"}));
    let snapshot = wait_snapshot(&h.controller, |s| s.messages.len() == 2).await;
    let ids: Vec<_> = snapshot.messages.iter().map(|m| m.id.0).collect();
    assert_eq!(ids, vec![9, 10]);
    assert_eq!(h.transport.live_sockets().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_for_job_resolves_or_drafts() {
    let h = harness(MockTransport::auto_accept());
    h.api.add_conversation(summary(501, 42, RECRUITER));

    let found = h
        .controller
        .open_for_job(JobId(42), UserId(RECRUITER))
        .await
        .unwrap();
    assert_eq!(found.id(), Some(ConversationId(501)));
    h.transport.wait_for_socket(1).await;

    let draft = h
        .controller
        .open_for_job(JobId(43), UserId(RECRUITER))
        .await
        .unwrap();
    assert!(draft.is_draft());
    assert!(h.transport.live_sockets().is_empty());
    assert_eq!(h.controller.conversation_id(), None);
}

#[tokio::test(start_paused = true)]
async fn close_unmounts_and_disconnects() {
    let h = harness(MockTransport::auto_accept());
    h.controller.open(persistent(501)).await.unwrap();
    let socket = h.transport.wait_for_socket(1).await;

    h.controller.close();
    assert!(socket.closed_by_client());
    let snapshot = h.controller.snapshot();
    assert!(snapshot.conversation.is_none());
    assert!(snapshot.messages.is_empty());
}
