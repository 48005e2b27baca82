// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging through the WhatsApp Cloud API.

use async_trait::async_trait;

use crate::error::FluxbotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MessageId;

/// Credentials resolved for one Cloud API send.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub phone_number_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// Sends text messages on behalf of a stateless cloud device.
///
/// Provider rejections surface as [`FluxbotError::Upstream`] carrying the
/// provider's HTTP status and message.
#[async_trait]
pub trait CloudMessenger: PluginAdapter {
    async fn send_text(
        &self,
        credentials: &CloudCredentials,
        to: &str,
        body: &str,
    ) -> Result<MessageId, FluxbotError>;
}
