// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Cloud API messenger.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use fluxbot_core::types::{AdapterType, HealthStatus, MessageId};
use fluxbot_core::{CloudCredentials, CloudMessenger, FluxbotError, PluginAdapter};

/// One captured send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSend {
    pub credentials: CloudCredentials,
    pub to: String,
    pub body: String,
}

/// Captures sends; can be told to answer like a rejecting provider.
#[derive(Default)]
pub struct MockCloudMessenger {
    reject_with: Mutex<Option<(u16, String)>>,
    sent: Mutex<Vec<CloudSend>>,
    counter: AtomicUsize,
}

impl MockCloudMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with `FluxbotError::Upstream`.
    pub fn reject_with(&self, status: u16, message: impl Into<String>) {
        *self
            .reject_with
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some((status, message.into()));
    }

    pub fn sent(&self) -> Vec<CloudSend> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PluginAdapter for MockCloudMessenger {
    fn name(&self) -> &str {
        "mock-cloud"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messenger
    }

    async fn health_check(&self) -> Result<HealthStatus, FluxbotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FluxbotError> {
        Ok(())
    }
}

#[async_trait]
impl CloudMessenger for MockCloudMessenger {
    async fn send_text(
        &self,
        credentials: &CloudCredentials,
        to: &str,
        body: &str,
    ) -> Result<MessageId, FluxbotError> {
        let rejection = self
            .reject_with
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some((status, message)) = rejection {
            return Err(FluxbotError::Upstream { status, message });
        }

        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(CloudSend {
                credentials: credentials.clone(),
                to: to.to_string(),
                body: body.to_string(),
            });
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageId(format!("wamid.mock{n}")))
    }
}
