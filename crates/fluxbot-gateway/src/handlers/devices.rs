// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device CRUD, lifecycle, and messaging.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{DeviceConfig, DeviceUpdate, Message, MessageId, NewDevice, Platform};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::cloud::send_cloud_text;
use super::{DeviceView, owned_device, parse_device_id, present};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::AppState;

const DEFAULT_MESSAGE_PAGE: i64 = 50;
const MAX_MESSAGE_PAGE: i64 = 500;

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceView>,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub device: DeviceView,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message_id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

/// GET /devices
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<DeviceListResponse>, ApiError> {
    let devices = state.storage.list_devices(user_id).await?;
    Ok(Json(DeviceListResponse {
        devices: devices.into_iter().map(DeviceView::from).collect(),
    }))
}

/// POST /devices
pub async fn create(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<CreateDeviceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let (Some(name), Some(platform)) = (present(body.name), present(body.platform)) else {
        return Err(ApiError::validation("name and platform are required"));
    };
    let platform = Platform::from_str(&platform)
        .map_err(|_| ApiError::validation(format!("invalid platform: {platform}")))?;

    let device = state
        .storage
        .create_device(&NewDevice {
            user_id,
            name,
            platform,
            config: body.config.map(DeviceConfig::from_value).unwrap_or_default(),
        })
        .await?;
    info!(device_id = %device.id, platform = %device.platform, "device created");
    Ok((StatusCode::CREATED, Json(DeviceView::from(device))))
}

/// GET /devices/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let id = parse_device_id(&id)?;
    let device = owned_device(&state, user_id, id).await?;
    Ok(Json(DeviceResponse {
        device: device.into(),
    }))
}

/// PUT /devices/{id}
///
/// Only `name` and an object-valued `config` are editable.
pub async fn update(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDeviceRequest>, JsonRejection>,
) -> Result<Json<DeviceView>, ApiError> {
    let id = parse_device_id(&id)?;
    let Json(body) = payload?;
    let update = DeviceUpdate {
        name: present(body.name),
        config: body
            .config
            .filter(Value::is_object)
            .map(DeviceConfig::from_value),
    };
    if update.is_empty() {
        return Err(ApiError::validation("nothing to update"));
    }

    let device = state
        .storage
        .update_device(user_id, id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("device not found"))?;
    Ok(Json(device.into()))
}

/// DELETE /devices/{id}
///
/// Tears down any live session before the row goes away.
pub async fn remove(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_device_id(&id)?;
    let device = owned_device(&state, user_id, id).await?;
    state.sessions.stop(device.id).await;
    if !state.storage.delete_device(user_id, device.id).await? {
        return Err(ApiError::not_found("device not found"));
    }
    info!(device_id = %device.id, "device deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /devices/{id}/connect
pub async fn connect(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    let id = parse_device_id(&id)?;
    let device = owned_device(&state, user_id, id).await?;
    state.sessions.start(&device).await?;
    Ok(Json(owned_device(&state, user_id, id).await?.into()))
}

/// POST /devices/{id}/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    let id = parse_device_id(&id)?;
    let device = owned_device(&state, user_id, id).await?;
    state.sessions.stop(device.id).await;
    Ok(Json(owned_device(&state, user_id, id).await?.into()))
}

/// POST /devices/{id}/send
///
/// `whatsapp` devices send through their live session; `whatsapp_cloud`
/// devices go through the Cloud API.
pub async fn send(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let id = parse_device_id(&id)?;
    let Json(body) = payload?;
    let (Some(to), Some(text)) = (present(body.to), body.text.filter(|t| !t.is_empty())) else {
        return Err(ApiError::validation("to and text are required"));
    };
    let device = owned_device(&state, user_id, id).await?;

    let message_id = match device.platform {
        Platform::WhatsApp => state.sessions.send_text(&device, &to, &text).await?,
        Platform::WhatsAppCloud => send_cloud_text(&state, &device, &to, &text).await?,
        Platform::Telegram => {
            return Err(FluxbotError::UnsupportedPlatform(device.platform.to_string()).into());
        }
    };
    Ok(Json(SendResponse {
        success: true,
        message_id,
    }))
}

/// GET /devices/{id}/messages?limit=N
///
/// The most recent messages, oldest first.
pub async fn messages(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let id = parse_device_id(&id)?;
    let device = owned_device(&state, user_id, id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_PAGE)
        .clamp(1, MAX_MESSAGE_PAGE);
    let messages = state.storage.list_messages(device.id, Some(limit)).await?;
    Ok(Json(MessageListResponse { messages }))
}
