// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator client for the Hireloop messaging client.
//!
//! [`RestClient`] implements [`hireloop_core::MessagingApi`] over `reqwest`
//! with bearer authentication and a single refresh-and-retry on 401.
//! [`SessionTokens`] implements [`hireloop_core::TokenProvider`] against the
//! token refresh endpoint.

pub mod client;
pub mod tokens;

pub use client::RestClient;
pub use tokens::SessionTokens;

use hireloop_core::HireloopError;

/// Map a transport-level reqwest failure into the workspace error type.
pub(crate) fn request_failed(e: reqwest::Error) -> HireloopError {
    HireloopError::Api {
        status: e.status().map(|s| s.as_u16()),
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Trim trailing slashes so paths can be appended with a single `/`.
pub(crate) fn normalize_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}
