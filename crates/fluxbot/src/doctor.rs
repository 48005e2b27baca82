// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fluxbot doctor` command implementation.
//!
//! Runs quick diagnostic checks against the configured environment: the
//! token secret, the database, the WhatsApp Web bridge, and the default
//! Cloud API credentials.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use fluxbot_config::FluxbotConfig;
use fluxbot_core::{FluxbotError, StorageAdapter};
use fluxbot_storage::SqliteStorage;

const BRIDGE_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `fluxbot doctor` command.
pub async fn run_doctor(config: &FluxbotConfig, plain: bool) -> Result<(), FluxbotError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_token_secret(config),
        check_database(&config.storage.database_path).await,
        check_bridge(&config.session.bridge_url).await,
        check_cloud_defaults(config),
    ];

    println!();
    println!("  fluxbot doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<16} {message} ({ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<16} {} ({ms}ms)", result.name, result.message)
    }
}

fn check_token_secret(config: &FluxbotConfig) -> CheckResult {
    let start = Instant::now();
    let configured = config
        .auth
        .token_secret
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if configured {
        CheckResult::new("Token secret", CheckStatus::Pass, "configured", start)
    } else {
        CheckResult::new(
            "Token secret",
            CheckStatus::Fail,
            "auth.token_secret is not set; serve will refuse to start",
            start,
        )
    }
}

/// Opens the database (applying pending migrations) and reads its clock.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !std::path::Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let storage = SqliteStorage::new(fluxbot_config::model::StorageConfig {
        database_path: db_path.to_string(),
        ..Default::default()
    });
    let probe = async {
        storage.initialize().await?;
        let now = storage.database_time().await?;
        storage.close().await?;
        Ok::<_, FluxbotError>(now)
    };
    match probe.await {
        Ok(now) => CheckResult::new("Database", CheckStatus::Pass, format!("connected (db time {now})"), start),
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Attempts a WebSocket handshake with the bridge.
async fn check_bridge(url: &str) -> CheckResult {
    let start = Instant::now();
    match tokio::time::timeout(BRIDGE_PROBE_TIMEOUT, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((mut socket, _))) => {
            let _ = socket.close(None).await;
            CheckResult::new("WhatsApp bridge", CheckStatus::Pass, format!("reachable at {url}"), start)
        }
        Ok(Err(e)) => CheckResult::new(
            "WhatsApp bridge",
            CheckStatus::Warn,
            format!("unreachable at {url}: {e}"),
            start,
        ),
        Err(_) => CheckResult::new(
            "WhatsApp bridge",
            CheckStatus::Warn,
            format!("no answer from {url} within {}s", BRIDGE_PROBE_TIMEOUT.as_secs()),
            start,
        ),
    }
}

fn check_cloud_defaults(config: &FluxbotConfig) -> CheckResult {
    let start = Instant::now();
    let cloud = &config.whatsapp_cloud;
    let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    match (set(&cloud.phone_number_id), set(&cloud.access_token)) {
        (true, true) => CheckResult::new("Cloud API", CheckStatus::Pass, "default credentials configured", start),
        (false, false) => CheckResult::new(
            "Cloud API",
            CheckStatus::Pass,
            "no defaults; devices must carry phoneNumberId and accessToken",
            start,
        ),
        _ => CheckResult::new(
            "Cloud API",
            CheckStatus::Warn,
            "only one of phone_number_id and access_token is set",
            start,
        ),
    }
}
