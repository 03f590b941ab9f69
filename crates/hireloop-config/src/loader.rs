// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./hireloop.toml` > `~/.config/hireloop/hireloop.toml` > `/etc/hireloop/hireloop.toml`
//! with environment variable overrides via `HIRELOOP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::HireloopConfig;

/// Config file name looked up in each hierarchy directory.
pub const CONFIG_FILE: &str = "hireloop.toml";

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/hireloop/hireloop.toml";

/// Sections that environment variables may address.
const ENV_SECTIONS: [&str; 4] = ["server", "reconnect", "unread", "logging"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/hireloop/hireloop.toml`
/// 3. `~/.config/hireloop/hireloop.toml`
/// 4. `./hireloop.toml`
/// 5. `HIRELOOP_*` environment variables
pub fn load_config() -> Result<HireloopConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HireloopConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HireloopConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HireloopConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HireloopConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HireloopConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/hireloop/hireloop.toml`, if a config dir exists on this platform.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hireloop").join(CONFIG_FILE))
}

/// Env provider mapping `HIRELOOP_<SECTION>_<KEY>` to `section.key`.
///
/// Keys are matched case-insensitively and only the first underscore after
/// a known section name becomes a dot, so `HIRELOOP_SERVER_WS_BASE` maps to
/// `server.ws_base`.
fn env_provider() -> Env {
    Env::prefixed("HIRELOOP_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
