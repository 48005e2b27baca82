// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fluxbot serve` command implementation.
//!
//! Opens SQLite storage, reconciles devices left live by a previous run,
//! wires the session manager to the WhatsApp bridge and the Cloud API, and
//! serves the HTTP API until SIGINT or SIGTERM.

use std::sync::Arc;

use fluxbot_config::FluxbotConfig;
use fluxbot_core::{
    CloudMessenger, FluxbotError, HealthStatus, PluginAdapter, StorageAdapter, WhatsAppClientFactory,
};
use fluxbot_gateway::{AppState, GatewaySettings, Passwords, TokenSigner, build_router, start_server};
use fluxbot_session::{BotRegistry, DeviceSessionManager, SessionSettings};
use fluxbot_storage::SqliteStorage;
use fluxbot_whatsapp::{BridgeClientFactory, CloudApiClient};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Devices recorded as live when the process last stopped lost their
/// sessions with it.
const RESTART_REASON: &str = "session lost on restart";

/// Runs the `fluxbot serve` command.
pub async fn run_serve(config: FluxbotConfig) -> Result<(), FluxbotError> {
    init_tracing(&config.logging.level);

    let secret = token_secret(&config)?;
    info!("starting fluxbot serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    report_adapter(storage.as_ref()).await;
    reconcile_devices(storage.as_ref()).await?;
    let storage_dyn: Arc<dyn StorageAdapter> = storage.clone();

    let factory: Arc<dyn WhatsAppClientFactory> =
        Arc::new(BridgeClientFactory::new(config.session.bridge_url.clone()));
    let sessions = Arc::new(DeviceSessionManager::new(
        Arc::new(BotRegistry::new()),
        Arc::clone(&storage_dyn),
        factory,
        SessionSettings::from_config(&config.session),
    ));
    let cloud: Arc<dyn CloudMessenger> = Arc::new(CloudApiClient::new(&config.whatsapp_cloud)?);
    report_adapter(cloud.as_ref()).await;

    let state = AppState {
        storage: storage_dyn,
        sessions: Arc::clone(&sessions),
        cloud: Arc::clone(&cloud),
        tokens: Arc::new(TokenSigner::new(secret, config.auth.token_ttl_days)),
        passwords: Passwords::default(),
        settings: Arc::new(GatewaySettings {
            subscription: config.subscription.clone(),
            whatsapp_cloud: config.whatsapp_cloud.clone(),
        }),
    };
    let app = build_router(state, config.server.cors_origin.as_deref())?;

    let cancel = install_signal_handler();
    let served = start_server(&config.server.host, config.server.port, app, cancel.clone()).await;
    cancel.cancel();

    sessions.shutdown().await;
    if let Err(e) = cloud.shutdown().await {
        warn!(error = %e, "cloud messenger shutdown failed");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }
    info!("fluxbot stopped");
    served
}

fn token_secret(config: &FluxbotConfig) -> Result<SecretString, FluxbotError> {
    config
        .auth
        .token_secret
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::from(s.to_string()))
        .ok_or_else(|| {
            FluxbotError::Config(
                "auth.token_secret is required (set FLUXBOT_AUTH_TOKEN_SECRET)".into(),
            )
        })
}

async fn report_adapter(adapter: &dyn PluginAdapter) {
    let name = adapter.name();
    let version = adapter.version();
    let kind = adapter.adapter_type();
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = name, %version, %kind, "adapter ready"),
        Ok(status) => warn!(adapter = name, %version, %kind, ?status, "adapter not healthy"),
        Err(e) => warn!(adapter = name, error = %e, "adapter health check failed"),
    }
}

/// Marks devices left connected or pending by a previous process as
/// disconnected.
async fn reconcile_devices(storage: &dyn StorageAdapter) -> Result<(), FluxbotError> {
    let count = storage.reset_live_devices(RESTART_REASON).await?;
    if count > 0 {
        info!(count, "marked stale devices as disconnected");
    }
    Ok(())
}

/// Returns a token cancelled on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fluxbot={log_level},warn")));

    // A subscriber may already be installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
