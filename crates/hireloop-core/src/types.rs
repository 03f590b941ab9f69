// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the channel clients, the reconciler and the REST client.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Server-assigned conversation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

/// Server-assigned message identifier. Messages within a conversation are
/// ordered by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// User identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Job posting identifier. Every conversation is anchored to exactly one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_inner!(ConversationId, MessageId, UserId, JobId);

/// The two sides of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Jobseeker,
    Recruiter,
}

impl Role {
    /// The role on the other side of a conversation.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Jobseeker => Role::Recruiter,
            Role::Recruiter => Role::Jobseeker,
        }
    }
}

/// The authenticated user looking at conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub role: Role,
}

impl Viewer {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Role of the sender of a message, relative to this viewer.
    pub fn role_of(&self, sender: UserId) -> Role {
        if sender == self.user_id {
            self.role
        } else {
            self.role.counterpart()
        }
    }
}

/// Delivery status of a message.
///
/// Ordered so that `Sent < Delivered < Read`; status only ever advances.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Returns the later of the two statuses. Never regresses.
    pub fn advance(self, to: MessageStatus) -> MessageStatus {
        self.max(to)
    }
}

/// Attachment metadata carried on a message. Upload itself happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(alias = "url")]
    pub file_url: String,
    #[serde(alias = "name")]
    pub file_name: String,
    #[serde(default, alias = "type")]
    pub file_type: Option<String>,
    #[serde(default, alias = "size")]
    pub file_size: Option<u64>,
}

/// A message as delivered by the REST history endpoint or a live `message` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    #[serde(default, alias = "conversation_id")]
    pub conversation: Option<ConversationId>,
    #[serde(alias = "sender_id")]
    pub sender: UserId,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default, alias = "text")]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageRecord {
    /// Status implied by the server record: persisted messages are at least delivered.
    pub fn server_status(&self) -> MessageStatus {
        if self.is_read || self.read_at.is_some() {
            MessageStatus::Read
        } else {
            MessageStatus::Delivered
        }
    }
}

/// Reconciled message as rendered by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: Option<ConversationId>,
    pub sender: Role,
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub content: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Build the view entry for a record as seen by `viewer`.
    pub fn from_record(record: MessageRecord, viewer: &Viewer) -> Self {
        let status = record.server_status();
        Self {
            id: record.id,
            conversation_id: record.conversation,
            sender: viewer.role_of(record.sender),
            sender_id: record.sender,
            sender_name: record.sender_name,
            content: record.content,
            sent_at: record.created_at,
            status,
            attachments: record.attachments,
        }
    }

    /// Display-formatted send time, e.g. `10:30 AM`.
    pub fn display_timestamp(&self) -> String {
        self.sent_at
            .map(|t| t.format("%I:%M %p").to_string())
            .unwrap_or_default()
    }
}

/// Push event from the notification channel announcing a new unread message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadEvent {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// The other participant as shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counterparty {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

/// Conversation entry returned by the REST list and lookup endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default, alias = "job")]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub other_user: Option<Counterparty>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_blocked: bool,
}

/// A conversation that does not exist server-side yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftConversation {
    pub job_id: JobId,
    pub other_user_id: UserId,
}

/// A conversation with a server-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentConversation {
    pub id: ConversationId,
    pub job_id: JobId,
    pub other_user_id: UserId,
    pub is_blocked: bool,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
}

impl PersistentConversation {
    /// Promote a summary returned by the REST API. Job and counterpart ids
    /// missing from the summary fall back to the draft being promoted.
    pub fn from_summary(summary: ConversationSummary, draft: DraftConversation) -> Self {
        Self {
            id: summary.id,
            job_id: summary.job_id.unwrap_or(draft.job_id),
            other_user_id: summary
                .other_user
                .and_then(|u| u.id)
                .unwrap_or(draft.other_user_id),
            is_blocked: summary.is_blocked,
            last_message: summary.last_message,
            last_message_time: summary.last_message_time,
        }
    }
}

/// A job-anchored conversation, either draft or persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversation {
    Draft(DraftConversation),
    Persistent(PersistentConversation),
}

impl Conversation {
    /// Server id, `None` for drafts.
    pub fn id(&self) -> Option<ConversationId> {
        match self {
            Conversation::Draft(_) => None,
            Conversation::Persistent(c) => Some(c.id),
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Conversation::Draft(d) => d.job_id,
            Conversation::Persistent(c) => c.job_id,
        }
    }

    pub fn other_user_id(&self) -> UserId {
        match self {
            Conversation::Draft(d) => d.other_user_id,
            Conversation::Persistent(c) => c.other_user_id,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Conversation::Draft(_))
    }

    pub fn is_blocked(&self) -> bool {
        match self {
            Conversation::Draft(_) => false,
            Conversation::Persistent(c) => c.is_blocked,
        }
    }
}

/// Short-lived access token used for both REST calls and socket handshakes.
#[derive(Debug)]
pub struct AccessToken {
    pub secret: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_at,
        }
    }

    /// Time left before expiry, saturating at zero. `None` if the lifetime is unknown.
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or_default())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Connection lifecycle of a channel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Socket open; sends are delivered.
    Open,
    /// Unexpected close; waiting out the backoff before `attempt`.
    Reconnecting { attempt: u32 },
    /// Closed intentionally.
    Closed,
    /// Retry budget exhausted; needs a manual reconnect.
    Failed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}
