// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device session lifecycle.
//!
//! ```text
//! disconnected ──start──▶ pending_qr ──ready──▶ connected
//!       ▲                      │                    │
//!       └──── stop / disconnected event ◀───────────┘
//!                 error (recoverable by a fresh start)
//! ```
//!
//! `whatsapp_cloud` devices skip `pending_qr` and never hold a live client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fluxbot_config::model::SessionConfig;
use fluxbot_core::types::{
    Device, DeviceId, DeviceStatus, LifecycleEvent, MessageId, NewMessage, Platform, UserId,
};
use fluxbot_core::{ClientHandle, ClientSpec, FluxbotError, StorageAdapter, WhatsAppClientFactory};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ingest::InboundIngestor;
use crate::registry::{BotRegistry, BotSession, SessionHandle};

const QR_IGNORED: &str = "QR ignored - open WhatsApp Web manually";

/// Paths and bounded waits used by the manager.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub auth_dir: PathBuf,
    pub connect_timeout: Duration,
    pub stop_timeout: Duration,
    pub send_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            auth_dir: PathBuf::from(&config.auth_dir),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Write a status transition, logging and swallowing storage failures.
async fn persist_status(
    storage: &dyn StorageAdapter,
    device_id: DeviceId,
    status: DeviceStatus,
    last_error: Option<&str>,
) {
    if let Err(e) = storage
        .update_device_status(device_id, status, last_error)
        .await
    {
        warn!(device_id = %device_id, status = %status, error = %e, "failed to persist device status");
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, FluxbotError>>,
) -> Result<T, FluxbotError> {
    timeout(limit, fut)
        .await
        .map_err(|_| FluxbotError::Timeout { duration: limit })?
}

/// Owns the start/stop state machine for every device.
pub struct DeviceSessionManager {
    registry: Arc<BotRegistry>,
    storage: Arc<dyn StorageAdapter>,
    factory: Arc<dyn WhatsAppClientFactory>,
    ingestor: InboundIngestor,
    settings: SessionSettings,
    event_loops: TaskTracker,
}

impl DeviceSessionManager {
    pub fn new(
        registry: Arc<BotRegistry>,
        storage: Arc<dyn StorageAdapter>,
        factory: Arc<dyn WhatsAppClientFactory>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            ingestor: InboundIngestor::new(Arc::clone(&storage)),
            storage,
            factory,
            settings,
            event_loops: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<BotRegistry> {
        &self.registry
    }

    pub fn ingestor(&self) -> &InboundIngestor {
        &self.ingestor
    }

    pub async fn update_status(
        &self,
        device_id: DeviceId,
        status: DeviceStatus,
        last_error: Option<&str>,
    ) {
        persist_status(self.storage.as_ref(), device_id, status, last_error).await;
    }

    /// Bring a device online.
    ///
    /// A device that already has a registered session is left alone. Failures
    /// to initiate a live connection are recorded on the device and returned.
    pub async fn start(&self, device: &Device) -> Result<(), FluxbotError> {
        if self.registry.get(device.id).is_some() {
            debug!(device_id = %device.id, "session already registered");
            return Ok(());
        }

        match device.platform {
            Platform::WhatsAppCloud => {
                if device.status != DeviceStatus::Connected {
                    self.update_status(device.id, DeviceStatus::Connected, None)
                        .await;
                }
                info!(device_id = %device.id, "cloud device marked connected");
                Ok(())
            }
            Platform::WhatsApp => self.start_whatsapp(device).await,
            Platform::Telegram => {
                let err = FluxbotError::UnsupportedPlatform(device.platform.to_string());
                self.update_status(device.id, DeviceStatus::Error, Some(&err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    async fn start_whatsapp(&self, device: &Device) -> Result<(), FluxbotError> {
        let spec = ClientSpec::for_device(device.id, &self.settings.auth_dir);
        let ClientHandle { client, events } = match self.factory.create(spec) {
            Ok(handle) => handle,
            Err(e) => {
                let reason = format!("failed to initialize: {e}");
                self.update_status(device.id, DeviceStatus::Error, Some(&reason))
                    .await;
                return Err(e);
            }
        };

        let session = Arc::new(BotSession::whatsapp(Arc::clone(&client)));
        let token = session.token();
        if !self.registry.register_if_absent(device.id, Arc::clone(&session)) {
            debug!(device_id = %device.id, "lost start race; keeping existing session");
            return Ok(());
        }

        self.spawn_event_loop(device.id, device.user_id, token, events);
        info!(device_id = %device.id, "initializing whatsapp session");

        if let Err(e) = bounded(self.settings.connect_timeout, client.initialize()).await {
            if !session.begin_close() {
                info!(device_id = %device.id, error = %e, "start abandoned by concurrent stop");
                return Err(e);
            }
            warn!(device_id = %device.id, error = %e, "session initiation failed");
            self.registry.unregister_session(device.id, token);
            if let Err(destroy_err) = bounded(self.settings.stop_timeout, client.destroy()).await {
                debug!(device_id = %device.id, error = %destroy_err, "teardown after failed start");
            }
            let reason = format!("failed to initialize: {e}");
            self.update_status(device.id, DeviceStatus::Error, Some(&reason))
                .await;
            return Err(e);
        }
        Ok(())
    }

    fn spawn_event_loop(
        &self,
        device_id: DeviceId,
        user_id: UserId,
        token: Uuid,
        events: mpsc::Receiver<LifecycleEvent>,
    ) {
        let ctx = EventLoop {
            device_id,
            user_id,
            token,
            registry: Arc::clone(&self.registry),
            storage: Arc::clone(&self.storage),
            ingestor: self.ingestor.clone(),
        };
        self.event_loops.spawn(ctx.run(events));
    }

    /// Take a device offline. Never fails; problems are recorded on the device.
    pub async fn stop(&self, device_id: DeviceId) {
        let Some(session) = self.registry.get(device_id) else {
            self.update_status(device_id, DeviceStatus::Disconnected, None)
                .await;
            return;
        };

        match session.handle() {
            SessionHandle::WhatsApp(client) => {
                session.begin_close();
                let outcome = bounded(self.settings.stop_timeout, client.destroy()).await;
                self.registry.unregister_session(device_id, session.token());
                match outcome {
                    Ok(()) => {
                        info!(device_id = %device_id, "session stopped");
                        self.update_status(device_id, DeviceStatus::Disconnected, None)
                            .await;
                    }
                    Err(e) => {
                        warn!(device_id = %device_id, error = %e, "session teardown failed");
                        let reason = format!("failed to stop: {e}");
                        self.update_status(device_id, DeviceStatus::Error, Some(&reason))
                            .await;
                    }
                }
            }
            SessionHandle::Cloud => {
                self.registry.unregister_session(device_id, session.token());
                self.update_status(device_id, DeviceStatus::Disconnected, None)
                    .await;
            }
        }
    }

    /// Send text through the device's live session and log the outbound message.
    pub async fn send_text(
        &self,
        device: &Device,
        to: &str,
        body: &str,
    ) -> Result<MessageId, FluxbotError> {
        let client = self
            .registry
            .get(device.id)
            .and_then(|session| session.client().cloned())
            .ok_or(FluxbotError::NotConnected(device.id.0))?;

        let message_id = bounded(self.settings.send_timeout, client.send_text(to, body)).await?;
        let from = ClientSpec::for_device(device.id, &self.settings.auth_dir).client_id;
        self.storage
            .insert_message(&NewMessage::outbound(
                device.id,
                device.user_id,
                from,
                to,
                body,
                message_id.clone(),
            ))
            .await?;
        Ok(message_id)
    }

    /// Stop every registered session and wait for their event loops.
    pub async fn shutdown(&self) {
        let live = self.registry.list();
        info!(sessions = live.len(), "stopping live sessions");
        for (device_id, _) in live {
            self.stop(device_id).await;
        }
        self.event_loops.close();
        if timeout(self.settings.stop_timeout, self.event_loops.wait())
            .await
            .is_err()
        {
            warn!("event loops still running after shutdown timeout");
        }
    }
}

/// Per-session consumer of lifecycle events.
struct EventLoop {
    device_id: DeviceId,
    user_id: UserId,
    token: Uuid,
    registry: Arc<BotRegistry>,
    storage: Arc<dyn StorageAdapter>,
    ingestor: InboundIngestor,
}

impl EventLoop {
    async fn run(self, mut events: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle(event).await {
                break;
            }
        }
        debug!(device_id = %self.device_id, "event loop finished");
    }

    /// Returns `false` once the session is over.
    async fn handle(&self, event: LifecycleEvent) -> bool {
        let id = self.device_id;
        match event {
            LifecycleEvent::QrPending => {
                info!(device_id = %id, "QR requested; pair out of band");
                self.write_if_current(DeviceStatus::PendingQr, Some(QR_IGNORED))
                    .await;
            }
            LifecycleEvent::Ready => {
                info!(device_id = %id, "session connected");
                self.write_if_current(DeviceStatus::Connected, None).await;
            }
            LifecycleEvent::Error { message } => {
                warn!(device_id = %id, error = %message, "client error");
                self.write_if_current(DeviceStatus::Error, Some(&message))
                    .await;
            }
            LifecycleEvent::StateChanged(state) => {
                debug!(device_id = %id, state = %state, "client state changed");
            }
            LifecycleEvent::MessageReceived(payload) => {
                if let Err(e) = self
                    .ingestor
                    .ingest_session_message(id, self.user_id, payload)
                    .await
                {
                    warn!(device_id = %id, error = %e, "failed to store inbound message");
                }
            }
            LifecycleEvent::Disconnected { reason } => {
                info!(device_id = %id, reason = reason.as_deref().unwrap_or(""), "session disconnected");
                let closing = self.current().is_some_and(|s| s.is_closing());
                let owned = self.registry.unregister_session(id, self.token);
                if owned && !closing {
                    persist_status(
                        self.storage.as_ref(),
                        id,
                        DeviceStatus::Disconnected,
                        reason.as_deref(),
                    )
                    .await;
                } else {
                    debug!(device_id = %id, "disconnect follows a teardown that recorded its own outcome");
                }
                return false;
            }
        }
        true
    }

    /// This loop's session, while it is still the registered one.
    fn current(&self) -> Option<Arc<BotSession>> {
        self.registry
            .get(self.device_id)
            .filter(|session| session.token() == self.token)
    }

    /// Events from a superseded or closing session must not overwrite the
    /// status of whatever replaced it or of the teardown in progress.
    async fn write_if_current(&self, status: DeviceStatus, last_error: Option<&str>) {
        if self.current().is_some_and(|session| !session.is_closing()) {
            persist_status(self.storage.as_ref(), self.device_id, status, last_error).await;
        } else {
            debug!(device_id = %self.device_id, status = %status, "ignoring event from stale session");
        }
    }
}
