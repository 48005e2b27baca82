// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The live WhatsApp client capability.
//!
//! The messaging library itself is opaque: FluxBot only needs to initialize a
//! connection, tear it down, send text, and observe lifecycle events.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::FluxbotError;
use crate::types::{DeviceId, LifecycleEvent, MessageId};

/// A live connection to WhatsApp for a single device.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    /// Starts the connection attempt. Resolves once the client is running;
    /// readiness is reported separately as [`LifecycleEvent::Ready`].
    async fn initialize(&self) -> Result<(), FluxbotError>;

    /// Tears the connection down and releases client resources.
    async fn destroy(&self) -> Result<(), FluxbotError>;

    /// Sends a text message to `to`, returning the provider message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<MessageId, FluxbotError>;
}

/// Where a client keeps its persistent credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    pub device_id: DeviceId,
    /// Credential-store key, stable per device (`device_<id>`).
    pub client_id: String,
    /// Directory holding the credential stores of all devices.
    pub data_path: PathBuf,
}

impl ClientSpec {
    pub fn for_device(device_id: DeviceId, data_path: impl Into<PathBuf>) -> Self {
        Self {
            device_id,
            client_id: format!("device_{device_id}"),
            data_path: data_path.into(),
        }
    }
}

/// A constructed (not yet initialized) client and its event stream.
pub struct ClientHandle {
    pub client: Arc<dyn WhatsAppClient>,
    pub events: mpsc::Receiver<LifecycleEvent>,
}

/// Builds live clients bound to a per-device credential store.
pub trait WhatsAppClientFactory: Send + Sync {
    fn create(&self, spec: ClientSpec) -> Result<ClientHandle, FluxbotError>;
}
