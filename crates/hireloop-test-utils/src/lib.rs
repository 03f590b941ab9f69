// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Hireloop integration tests.
//!
//! Provides in-memory stand-ins for the collaborators of the messaging core
//! so channel and session tests run deterministically without a backend.
//!
//! # Components
//!
//! - [`MockTransport`] - Socket transport with scripted handshakes, pushes and drops
//! - [`MockMessagingApi`] - REST collaborator with canned responses and a call log
//! - [`StaticTokens`] - Token provider that counts refreshes

pub mod mock_api;
pub mod mock_transport;
pub mod tokens;

pub use mock_api::{record, summary, ApiCall, MockMessagingApi};
pub use mock_transport::{MockSocket, MockTransport};
pub use tokens::StaticTokens;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mock's state, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
