// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fluxbot config` command implementation.

use fluxbot_config::FluxbotConfig;
use fluxbot_core::FluxbotError;

const REDACTED: &str = "********";

/// Copy of `config` with every credential replaced by a placeholder.
fn redacted(config: &FluxbotConfig) -> FluxbotConfig {
    let mut config = config.clone();
    let mask = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some(REDACTED.to_string());
        }
    };
    mask(&mut config.auth.token_secret);
    mask(&mut config.whatsapp_cloud.access_token);
    mask(&mut config.whatsapp_cloud.app_secret);
    mask(&mut config.whatsapp_cloud.webhook_verify_token);
    config
}

fn render(config: &FluxbotConfig) -> Result<String, FluxbotError> {
    toml::to_string_pretty(&redacted(config))
        .map_err(|e| FluxbotError::Config(format!("failed to render configuration: {e}")))
}

/// Print the effective configuration as TOML.
pub fn run_config(config: &FluxbotConfig) -> Result<(), FluxbotError> {
    print!("{}", render(config)?);
    Ok(())
}
