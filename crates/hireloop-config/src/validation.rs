// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks URL schemes, reconnect bounds and the log level, none of which
//! serde attributes can express.

use crate::diagnostic::ConfigError;
use crate::model::HireloopConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &HireloopConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let ws_base = config.server.ws_base.trim();
    if !(ws_base.starts_with("ws://") || ws_base.starts_with("wss://")) {
        errors.push(ConfigError::Validation {
            message: format!("server.ws_base `{ws_base}` must start with ws:// or wss://"),
        });
    }

    let api_base = config.server.api_base.trim();
    if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("server.api_base `{api_base}` must start with http:// or https://"),
        });
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "server.request_timeout_secs must be greater than 0".to_string(),
        });
    }

    let reconnect = &config.reconnect;
    if reconnect.initial_delay_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "reconnect.initial_delay_ms must be greater than 0".to_string(),
        });
    }

    if reconnect.max_delay_ms < reconnect.initial_delay_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "reconnect.max_delay_ms ({}) must be at least reconnect.initial_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.initial_delay_ms
            ),
        });
    }

    if reconnect.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "reconnect.max_attempts must be at least 1".to_string(),
        });
    }

    if config.unread.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "unread.poll_interval_secs must be greater than 0".to_string(),
        });
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&HireloopConfig::default()).is_ok());
    }

    #[test]
    fn http_socket_base_is_rejected() {
        let mut config = HireloopConfig::default();
        config.server.ws_base = "http://localhost:8002".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("server.ws_base"));
    }

    #[test]
    fn all_failures_are_collected() {
        let mut config = HireloopConfig::default();
        config.reconnect.initial_delay_ms = 0;
        config.reconnect.max_attempts = 0;
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn max_delay_below_initial_is_rejected() {
        let mut config = HireloopConfig::default();
        config.reconnect.initial_delay_ms = 5000;
        config.reconnect.max_delay_ms = 1000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("max_delay_ms"));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = HireloopConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
