// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login session file and collaborator wiring.
//!
//! The CLI does not log in by itself. It reads the tokens of an existing
//! session from `~/.config/hireloop/session.toml`:
//!
//! ```toml
//! access = "eyJ..."
//! refresh = "eyJ..."
//! user_id = 17
//! role = "recruiter"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use hireloop_api::{RestClient, SessionTokens};
use hireloop_chat::{ChannelContext, ReconnectPolicy, WsEndpoints};
use hireloop_config::HireloopConfig;
use hireloop_core::{HireloopError, MessagingApi, Role, TokenProvider, UserId, Viewer};
use hireloop_transport::WsTransport;

pub const SESSION_FILE: &str = "session.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFile {
    pub access: SecretString,
    pub refresh: SecretString,
    pub user_id: u64,
    pub role: Role,
}

impl SessionFile {
    pub fn viewer(&self) -> Viewer {
        Viewer::new(UserId(self.user_id), self.role)
    }
}

pub fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hireloop").join(SESSION_FILE))
}

pub fn load_session(path: &Path) -> Result<SessionFile, HireloopError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HireloopError::Config(format!("cannot read session file {}: {e}", path.display()))
    })?;
    toml::from_str(&content)
        .map_err(|e| HireloopError::Config(format!("invalid session file {}: {e}", path.display())))
}

/// Collaborators shared by the `chat` and `unread` commands.
pub struct Wiring {
    pub viewer: Viewer,
    pub api: Arc<dyn MessagingApi>,
    pub context: ChannelContext,
}

pub fn wire(config: &HireloopConfig, session: &SessionFile) -> Result<Wiring, HireloopError> {
    let timeout = config.server.request_timeout();
    let tokens: Arc<dyn TokenProvider> = Arc::new(SessionTokens::new(
        &config.server.api_base,
        session.access.expose_secret(),
        session.refresh.expose_secret(),
        timeout,
    )?);
    let api: Arc<dyn MessagingApi> = Arc::new(RestClient::new(
        &config.server.api_base,
        timeout,
        Arc::clone(&tokens),
    )?);
    let context = ChannelContext::new(
        Arc::new(WsTransport::new()),
        tokens,
        WsEndpoints::new(config.server.ws_base.clone()),
    )
    .with_policy(ReconnectPolicy::from(&config.reconnect));

    Ok(Wiring {
        viewer: session.viewer(),
        api,
        context,
    })
}
