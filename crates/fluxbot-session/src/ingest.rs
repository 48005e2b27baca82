// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message ingestion.
//!
//! Live sessions and Cloud API webhooks both end up here; each message is
//! bound to a device and its owner before it is persisted.

use std::sync::Arc;

use fluxbot_core::types::{DeviceId, InboundPayload, NewMessage, UserId};
use fluxbot_core::{FluxbotError, StorageAdapter};
use tracing::{debug, warn};

/// Tally of one webhook delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub stored: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct InboundIngestor {
    storage: Arc<dyn StorageAdapter>,
}

impl InboundIngestor {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Persist a message received on a live session.
    pub async fn ingest_session_message(
        &self,
        device_id: DeviceId,
        user_id: UserId,
        payload: InboundPayload,
    ) -> Result<i64, FluxbotError> {
        let id = self
            .storage
            .insert_message(&NewMessage::inbound(device_id, user_id, payload))
            .await?;
        debug!(device_id = %device_id, message_id = id, "inbound message stored");
        Ok(id)
    }

    /// Persist messages delivered by a Cloud API webhook.
    ///
    /// Each message is resolved to the cloud device whose configured
    /// `phoneNumberId` matches. Unresolvable or unpersistable messages are
    /// logged and dropped.
    pub async fn ingest_cloud_messages(
        &self,
        messages: impl IntoIterator<Item = (String, InboundPayload)>,
    ) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        for (phone_number_id, payload) in messages {
            let device = match self
                .storage
                .find_cloud_device_by_phone_number_id(&phone_number_id)
                .await
            {
                Ok(Some(device)) => device,
                Ok(None) => {
                    warn!(phone_number_id = %phone_number_id, "webhook: no cloud device for phone number id");
                    outcome.dropped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(phone_number_id = %phone_number_id, error = %e, "webhook: device lookup failed");
                    outcome.dropped += 1;
                    continue;
                }
            };

            match self
                .storage
                .insert_message(&NewMessage::inbound(device.id, device.user_id, payload))
                .await
            {
                Ok(id) => {
                    debug!(device_id = %device.id, message_id = id, "webhook message stored");
                    outcome.stored += 1;
                }
                Err(e) => {
                    warn!(device_id = %device.id, error = %e, "webhook: failed to store message");
                    outcome.dropped += 1;
                }
            }
        }
        outcome
    }
}
