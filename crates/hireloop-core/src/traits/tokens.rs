// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access token source shared by REST calls and socket handshakes.

use async_trait::async_trait;

use crate::error::HireloopError;
use crate::types::AccessToken;

/// Supplies the short-lived access token.
///
/// Refresh happens out-of-band from the sockets; channel clients call
/// [`refresh`](TokenProvider::refresh) only after the server rejected or the
/// token outlived its lifetime.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// The current access token.
    async fn access_token(&self) -> Result<AccessToken, HireloopError>;

    /// Obtain a fresh access token, replacing the current one.
    async fn refresh(&self) -> Result<AccessToken, HireloopError>;
}
