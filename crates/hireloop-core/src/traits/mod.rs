// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the messaging core and its collaborators.
//!
//! The socket transport and token source are synchronous-dispatch or
//! `#[async_trait]` object-safe traits so clients hold them as `Arc<dyn ...>`.

pub mod api;
pub mod tokens;
pub mod transport;

pub use api::{MessagingApi, StartConversation};
pub use tokens::TokenProvider;
pub use transport::{
    redact_token, CloseInfo, Connection, Transport, TransportEvent, TransportHandle,
};
