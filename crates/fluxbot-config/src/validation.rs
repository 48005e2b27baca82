// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::FluxbotConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &FluxbotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if let Some(secret) = &config.auth.token_secret
        && secret.len() < 16
    {
        fail("auth.token_secret must be at least 16 characters".to_string());
    }

    if config.auth.token_ttl_days == 0 {
        fail("auth.token_ttl_days must be at least 1".to_string());
    }

    if config.subscription.plan_id < 1 {
        fail(format!(
            "subscription.plan_id must be positive, got {}",
            config.subscription.plan_id
        ));
    }

    if config.session.auth_dir.trim().is_empty() {
        fail("session.auth_dir must not be empty".to_string());
    }

    let bridge = config.session.bridge_url.trim();
    if !(bridge.starts_with("ws://") || bridge.starts_with("wss://")) {
        fail(format!(
            "session.bridge_url `{bridge}` must start with ws:// or wss://"
        ));
    }

    for (key, value) in [
        (
            "session.connect_timeout_secs",
            config.session.connect_timeout_secs,
        ),
        ("session.stop_timeout_secs", config.session.stop_timeout_secs),
        ("session.send_timeout_secs", config.session.send_timeout_secs),
        (
            "whatsapp_cloud.request_timeout_secs",
            config.whatsapp_cloud.request_timeout_secs,
        ),
    ] {
        if value == 0 {
            fail(format!("{key} must be at least 1"));
        }
    }

    let api = config.whatsapp_cloud.api_base_url.trim();
    if !(api.starts_with("http://") || api.starts_with("https://")) {
        fail(format!(
            "whatsapp_cloud.api_base_url `{api}` must be an http(s) URL"
        ));
    }

    if config.whatsapp_cloud.api_version.trim().is_empty() {
        fail("whatsapp_cloud.api_version must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        fail(format!(
            "logging.level `{}` must be one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
