// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unread badge state for one login session.
//!
//! [`UnreadStore`] is an injectable store combining chat and notification
//! unread counts; every mutation is published through a `watch` channel.
//! [`UnreadSession`] binds a store to the notification channel for the
//! lifetime of a login and falls back to REST polling while the channel is
//! down.

pub mod session;
pub mod store;

pub use session::UnreadSession;
pub use store::{UnreadStore, UnreadTotals};
