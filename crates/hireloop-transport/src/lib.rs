// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport adapter for the Hireloop messaging client.
//!
//! [`WsTransport`] implements [`hireloop_core::Transport`] over
//! `tokio-tungstenite`. Each opened connection is served by a single task that
//! owns the socket; the returned handle talks to it through a command queue.

pub mod ws;

pub use ws::WsTransport;
