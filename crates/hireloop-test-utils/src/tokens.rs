// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token provider with a fixed token and counted refreshes.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hireloop_core::{AccessToken, HireloopError, TokenProvider};

use crate::lock;

struct TokenState {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
    refreshes: u32,
    refreshed_lifetime: Option<Duration>,
    fail_refresh: bool,
}

/// Hands out `base` until refreshed; the n-th refresh yields `base-rn`.
pub struct StaticTokens {
    base: String,
    state: Mutex<TokenState>,
}

impl StaticTokens {
    /// A token without a known expiry.
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_expiry(secret, None)
    }

    pub fn with_expiry(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        let secret = secret.into();
        Self {
            base: secret.clone(),
            state: Mutex::new(TokenState {
                secret,
                expires_at,
                refreshes: 0,
                refreshed_lifetime: None,
                fail_refresh: false,
            }),
        }
    }

    /// Lifetime given to tokens produced by `refresh`. Unknown by default.
    pub fn refreshed_lifetime(self, lifetime: Duration) -> Self {
        lock(&self.state).refreshed_lifetime = Some(lifetime);
        self
    }

    /// Make every subsequent refresh fail with an auth error.
    pub fn fail_refresh(&self, fail: bool) {
        lock(&self.state).fail_refresh = fail;
    }

    pub fn refresh_count(&self) -> u32 {
        lock(&self.state).refreshes
    }

    /// The secret `access_token` currently returns.
    pub fn current(&self) -> String {
        lock(&self.state).secret.clone()
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn access_token(&self) -> Result<AccessToken, HireloopError> {
        let state = lock(&self.state);
        Ok(AccessToken::new(state.secret.clone(), state.expires_at))
    }

    async fn refresh(&self) -> Result<AccessToken, HireloopError> {
        let mut state = lock(&self.state);
        if state.fail_refresh {
            return Err(HireloopError::Auth("refresh rejected".into()));
        }
        state.refreshes += 1;
        state.secret = format!("{}-r{}", self.base, state.refreshes);
        state.expires_at = state
            .refreshed_lifetime
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Ok(AccessToken::new(state.secret.clone(), state.expires_at))
    }
}
