// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API messages endpoint.

use std::time::Duration;

use async_trait::async_trait;
use fluxbot_config::model::WhatsAppCloudConfig;
use fluxbot_core::types::{AdapterType, HealthStatus, MessageId};
use fluxbot_core::{CloudCredentials, CloudMessenger, FluxbotError, PluginAdapter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendTextResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// Sends text messages through `POST {base}/{version}/{phone_number_id}/messages`.
#[derive(Debug, Clone)]
pub struct CloudApiClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    timeout: Duration,
}

impl CloudApiClient {
    pub fn new(config: &WhatsAppCloudConfig) -> Result<Self, FluxbotError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FluxbotError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            timeout,
        })
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url, self.api_version, phone_number_id
        )
    }
}

#[async_trait]
impl PluginAdapter for CloudApiClient {
    fn name(&self) -> &str {
        "whatsapp-cloud"
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
impl CloudMessenger for CloudApiClient {
    async fn send_text(
        &self,
        credentials: &CloudCredentials,
        to: &str,
        body: &str,
    ) -> Result<MessageId, FluxbotError> {
        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        };

        let response = self
            .client
            .post(self.messages_url(&credentials.phone_number_id))
            .bearer_auth(&credentials.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FluxbotError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    FluxbotError::Channel {
                        message: format!("cloud API request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        debug!(status = %status, phone_number_id = %credentials.phone_number_id, "cloud API response received");

        let text = response.text().await.map_err(|e| FluxbotError::Channel {
            message: format!("failed to read cloud API response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GraphErrorResponse>(&text)
                .map(|r| r.error.message)
                .unwrap_or_else(|_| {
                    if text.is_empty() {
                        status.to_string()
                    } else {
                        text.clone()
                    }
                });
            warn!(status = %status, error = %message, "cloud API rejected message");
            return Err(FluxbotError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SendTextResponse =
            serde_json::from_str(&text).map_err(|e| FluxbotError::Channel {
                message: format!("failed to parse cloud API response: {e}"),
                source: Some(Box::new(e)),
            })?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| MessageId(m.id))
            .ok_or_else(|| FluxbotError::channel("cloud API response carried no message id"))
    }
}
