// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the conversation and notification endpoints.
//!
//! Every request carries `Authorization: Bearer <access token>`. A 401 triggers
//! one token refresh and one retry; any other failure is returned as
//! [`HireloopError::Api`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use hireloop_core::traits::StartConversation;
use hireloop_core::{
    ConversationId, ConversationSummary, HireloopError, JobId, MessageRecord, MessagingApi,
    TokenProvider,
};

use crate::{normalize_base, request_failed};

/// List endpoints answer with a bare array or a paginated `{"results": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Plain(items) | ListBody::Paged { results: items } => items,
        }
    }
}

#[derive(Deserialize)]
struct CountBody {
    #[serde(default)]
    count: u32,
}

/// REST client for the messaging backend.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    /// `api_base` is the prefix `/v1/...` paths are appended to, e.g.
    /// `https://api.example.com/api`.
    pub fn new(
        api_base: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, HireloopError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HireloopError::Api {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: normalize_base(api_base),
            tokens,
        })
    }

    /// Send one authenticated request, refreshing the token and retrying once on 401.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, HireloopError> {
        let url = format!("{}{path}", self.base_url);

        let token = self.tokens.access_token().await?;
        let response = self
            .send_once(method.clone(), &url, token.secret.expose_secret(), body)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(%method, path, "access token rejected, refreshing");
        let token = self.tokens.refresh().await?;
        self.send_once(method, &url, token.secret.expose_secret(), body)
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        bearer: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, HireloopError> {
        let mut request = self.http.request(method.clone(), url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(request_failed)?;
        debug!(%method, url, status = %response.status(), "api response");
        Ok(response)
    }

    /// Execute and decode a JSON body, failing on any non-success status.
    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, HireloopError> {
        let response = ensure_success(self.execute(method, path, body).await?).await?;
        decode(response).await
    }

    /// Execute and discard the body, failing on any non-success status.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(), HireloopError> {
        ensure_success(self.execute(method, path, body).await?).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, HireloopError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(HireloopError::Api {
            status: Some(status.as_u16()),
            message: "access token rejected after refresh".into(),
            source: None,
        });
    }
    Err(HireloopError::Api {
        status: Some(status.as_u16()),
        message: format!("API returned {status}: {body}"),
        source: None,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HireloopError> {
    let status = response.status();
    let text = response.text().await.map_err(request_failed)?;
    serde_json::from_str(&text).map_err(|e| HireloopError::Api {
        status: Some(status.as_u16()),
        message: format!("failed to parse API response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl MessagingApi for RestClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, HireloopError> {
        let body: ListBody<ConversationSummary> = self
            .fetch(Method::GET, "/v1/chat/conversations/", None)
            .await?;
        Ok(body.into_vec())
    }

    async fn conversation_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Option<ConversationSummary>, HireloopError> {
        let path = format!("/v1/chat/conversation/?job_id={job_id}");
        let response = self.execute(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%job_id, "no conversation for job");
            return Ok(None);
        }
        // The endpoint answers `null` when no conversation exists yet.
        decode(ensure_success(response).await?).await
    }

    async fn messages(&self, id: ConversationId) -> Result<Vec<MessageRecord>, HireloopError> {
        let path = format!("/v1/chat/conversations/{id}/messages/");
        let body: ListBody<MessageRecord> = self.fetch(Method::GET, &path, None).await?;
        Ok(body.into_vec())
    }

    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<ConversationSummary, HireloopError> {
        let body = serde_json::to_value(&request)?;
        self.fetch(Method::POST, "/v1/chat/conversations/start/", Some(&body))
            .await
    }

    async fn mark_conversation_read(&self, id: ConversationId) -> Result<(), HireloopError> {
        let path = format!("/v1/chat/conversations/{id}/read/");
        self.call(Method::POST, &path, None).await
    }

    async fn unread_notifications_count(&self) -> Result<u32, HireloopError> {
        let body: CountBody = self
            .fetch(Method::GET, "/v1/notifications/?page=1&is_read=false", None)
            .await?;
        Ok(body.count)
    }

    async fn mark_all_notifications_read(&self) -> Result<(), HireloopError> {
        self.call(Method::PATCH, "/v1/notifications/mark-all-read/", None)
            .await
    }
}
