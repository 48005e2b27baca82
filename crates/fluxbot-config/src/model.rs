// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the FluxBot backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level FluxBot configuration.
///
/// Every section is optional and defaults to values suitable for local
/// development, except `auth.token_secret` which `serve` requires.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FluxbotConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub subscription: SubscriptionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub whatsapp_cloud: WhatsAppCloudConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin. `None` allows any origin.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("fluxbot").join("fluxbot.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("fluxbot.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Bearer token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC key used to sign bearer tokens.
    #[serde(default)]
    pub token_secret: Option<String>,

    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

fn default_token_ttl_days() -> u32 {
    7
}

/// Trial subscription granted at registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,

    #[serde(default = "default_plan_id")]
    pub plan_id: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            plan_id: default_plan_id(),
        }
    }
}

fn default_trial_days() -> u32 {
    7
}

fn default_plan_id() -> i64 {
    1
}

/// Live WhatsApp Web session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory holding the per-device credential stores.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,

    /// WebSocket URL of the WhatsApp Web bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_dir: default_auth_dir(),
            bridge_url: default_bridge_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_auth_dir() -> String {
    ".wwebjs_auth".to_string()
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:4100".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_stop_timeout_secs() -> u64 {
    15
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// WhatsApp Cloud API settings.
///
/// `phone_number_id` and `access_token` are fallbacks for devices whose own
/// configuration omits them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppCloudConfig {
    #[serde(default)]
    pub phone_number_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Token echoed back during webhook verification.
    #[serde(default)]
    pub webhook_verify_token: Option<String>,

    /// Meta app secret. When set, webhook payloads must carry a valid
    /// `X-Hub-Signature-256`.
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppCloudConfig {
    fn default() -> Self {
        Self {
            phone_number_id: None,
            access_token: None,
            webhook_verify_token: None,
            app_secret: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v19.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
