// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access/refresh token pair with refresh against `/v1/auth/token/refresh/`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use hireloop_core::{AccessToken, HireloopError, TokenProvider};

use crate::{normalize_base, request_failed};

const REFRESH_PATH: &str = "/v1/auth/token/refresh/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

struct TokenPair {
    access: SecretString,
    refresh: SecretString,
}

/// Token provider for a logged-in session.
///
/// The access token's expiry is read from its JWT `exp` claim when present.
/// Refreshes are coalesced: a caller that waited on a refresh already in
/// flight gets its result instead of posting again.
pub struct SessionTokens {
    http: reqwest::Client,
    refresh_url: String,
    pair: Mutex<TokenPair>,
    /// Completed refreshes.
    generation: AtomicU64,
}

impl SessionTokens {
    pub fn new(
        api_base: &str,
        access: impl Into<String>,
        refresh: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HireloopError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HireloopError::Api {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            refresh_url: format!("{}{REFRESH_PATH}", normalize_base(api_base)),
            pair: Mutex::new(TokenPair {
                access: SecretString::from(access.into()),
                refresh: SecretString::from(refresh.into()),
            }),
            generation: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl TokenProvider for SessionTokens {
    async fn access_token(&self) -> Result<AccessToken, HireloopError> {
        let pair = self.pair.lock().await;
        let secret = pair.access.expose_secret();
        if secret.is_empty() {
            return Err(HireloopError::Auth("no access token".into()));
        }
        Ok(AccessToken::new(secret, jwt_expiry(secret)))
    }

    async fn refresh(&self) -> Result<AccessToken, HireloopError> {
        let seen = self.generation.load(Ordering::SeqCst);
        let mut pair = self.pair.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen {
            debug!("access token refreshed while waiting, reusing it");
            let secret = pair.access.expose_secret();
            return Ok(AccessToken::new(secret, jwt_expiry(secret)));
        }
        if pair.refresh.expose_secret().is_empty() {
            return Err(HireloopError::Auth("no refresh token".into()));
        }

        let response = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh": pair.refresh.expose_secret() }))
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST
        {
            warn!(status = %status, "refresh token rejected");
            return Err(HireloopError::Auth(format!(
                "refresh token rejected ({status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HireloopError::Api {
                status: Some(status.as_u16()),
                message: format!("token refresh returned {status}: {body}"),
                source: None,
            });
        }

        let body: RefreshResponse = response.json().await.map_err(|e| HireloopError::Api {
            status: Some(status.as_u16()),
            message: format!("failed to parse refresh response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let expires_at = jwt_expiry(&body.access);
        debug!(expires_at = ?expires_at, "access token refreshed");
        if let Some(refresh) = body.refresh {
            pair.refresh = SecretString::from(refresh);
        }
        let token = AccessToken::new(body.access.clone(), expires_at);
        pair.access = SecretString::from(body.access);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(token)
    }
}

/// Expiry from the `exp` claim of a JWT, without verifying the signature.
/// Opaque tokens yield `None`.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}
