// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API: outbound send and the inbound webhook.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use fluxbot_core::CloudCredentials;
use fluxbot_core::types::{Device, MessageId, NewMessage, Platform};
use fluxbot_whatsapp::{
    SIGNATURE_HEADER, VerifyQuery, parse_webhook_messages, verify_challenge, verify_signature,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::devices::SendResponse;
use super::{owned_device, parse_device_id, present};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSendRequest {
    /// Accepted as a number or a numeric string.
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Device credentials, falling back to the process-wide defaults.
fn resolve_credentials(state: &AppState, device: &Device) -> Result<CloudCredentials, ApiError> {
    let defaults = &state.settings.whatsapp_cloud;
    let phone_number_id = device
        .config
        .phone_number_id()
        .map(String::from)
        .or_else(|| defaults.phone_number_id.clone().filter(|s| !s.is_empty()));
    let access_token = device
        .config
        .access_token()
        .map(String::from)
        .or_else(|| defaults.access_token.clone().filter(|s| !s.is_empty()));

    match (phone_number_id, access_token) {
        (Some(phone_number_id), Some(access_token)) => Ok(CloudCredentials {
            phone_number_id,
            access_token,
        }),
        _ => Err(ApiError::validation(
            "WhatsApp Cloud configuration (phoneNumberId, accessToken) is missing",
        )),
    }
}

/// Send through the Cloud API and record the outbound message.
///
/// Nothing is persisted when the provider rejects the send.
pub(crate) async fn send_cloud_text(
    state: &AppState,
    device: &Device,
    to: &str,
    text: &str,
) -> Result<MessageId, ApiError> {
    let credentials = resolve_credentials(state, device)?;
    let message_id = state.cloud.send_text(&credentials, to, text).await?;
    state
        .storage
        .insert_message(&NewMessage::outbound(
            device.id,
            device.user_id,
            credentials.phone_number_id.as_str(),
            to,
            text,
            message_id.clone(),
        ))
        .await?;
    info!(device_id = %device.id, "cloud message sent");
    Ok(message_id)
}

fn parse_body_device_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// POST /whatsapp-cloud/send
pub async fn send(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<CloudSendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(body) = payload?;
    let (Some(raw_id), Some(to), Some(text)) = (
        parse_body_device_id(body.device_id.as_ref()),
        present(body.to),
        body.text.filter(|t| !t.is_empty()),
    ) else {
        return Err(ApiError::validation("deviceId, to and text are required"));
    };
    let id = parse_device_id(&raw_id)?;

    let device = owned_device(&state, user_id, id).await?;
    if device.platform != Platform::WhatsAppCloud {
        return Err(ApiError::not_found("WhatsApp Cloud device not found"));
    }

    let message_id = send_cloud_text(&state, &device, &to, &text).await?;
    Ok(Json(SendResponse {
        success: true,
        message_id,
    }))
}

/// GET /whatsapp-cloud/webhook
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let expected = state.settings.whatsapp_cloud.webhook_verify_token.as_deref();
    match verify_challenge(query, expected) {
        Some(challenge) => {
            info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /whatsapp-cloud/webhook
///
/// Always answers 200 so the provider does not retry; problems are logged.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = state.settings.whatsapp_cloud.app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if let Err(e) = verify_signature(&body, signature, secret) {
            warn!(error = %e, "webhook: dropping payload with bad signature");
            return StatusCode::OK;
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook: body is not JSON");
            return StatusCode::OK;
        }
    };

    let messages = parse_webhook_messages(&payload);
    if messages.is_empty() {
        debug!("webhook: no inbound messages in payload");
        return StatusCode::OK;
    }
    let outcome = state.sessions.ingestor().ingest_cloud_messages(messages).await;
    info!(stored = outcome.stored, dropped = outcome.dropped, "webhook processed");
    StatusCode::OK
}
