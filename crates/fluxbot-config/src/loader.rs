// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/fluxbot/fluxbot.toml`, then
//! `~/.config/fluxbot/fluxbot.toml`, then `./fluxbot.toml`, with `FLUXBOT_*`
//! environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FluxbotConfig;

/// Config sections, longest first so `whatsapp_cloud_` wins over any shorter prefix.
const SECTIONS: &[&str] = &[
    "whatsapp_cloud",
    "subscription",
    "session",
    "storage",
    "logging",
    "server",
    "auth",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/fluxbot/fluxbot.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "fluxbot.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fluxbot/fluxbot.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<FluxbotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<FluxbotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FluxbotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FluxbotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FluxbotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FluxbotConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps `FLUXBOT_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Keys contain underscores, so splitting on `_` is ambiguous; only the known
/// section prefix is turned into a dot.
fn env_provider() -> Env {
    Env::prefixed("FLUXBOT_").map(|key| map_env_key(key.as_str()).into())
}

/// `key` arrives with the prefix stripped but its case intact.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("SERVER_PORT"), "server.port");
        assert_eq!(
            map_env_key("WHATSAPP_CLOUD_ACCESS_TOKEN"),
            "whatsapp_cloud.access_token"
        );
        assert_eq!(
            map_env_key("SESSION_CONNECT_TIMEOUT_SECS"),
            "session.connect_timeout_secs"
        );
        assert_eq!(map_env_key("AUTH_TOKEN_SECRET"), "auth.token_secret");
        assert_eq!(map_env_key("server_host"), "server.host");
        assert_eq!(map_env_key("UNRELATED"), "unrelated");
    }

    #[test]
    fn env_alone_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FLUXBOT_SERVER_PORT", "6000");
            jail.set_env("FLUXBOT_LOGGING_LEVEL", "debug");
            let config = load_config()?;
            assert_eq!(config.server.port, 6000);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }
}
