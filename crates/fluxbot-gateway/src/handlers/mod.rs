// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers, grouped by resource.

pub mod auth;
pub mod cloud;
pub mod devices;
pub mod misc;

use chrono::{DateTime, Utc};
use fluxbot_core::types::{Device, DeviceId, DeviceStatus, Platform, UserId};
use fluxbot_core::FluxbotError;
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

/// Device as returned to clients. The configuration blob is never echoed
/// back since it may hold provider access tokens.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub id: DeviceId,
    pub user_id: UserId,
    pub name: String,
    pub platform: Platform,
    pub status: DeviceStatus,
    pub last_error: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for DeviceView {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            user_id: device.user_id,
            name: device.name,
            platform: device.platform,
            status: device.status,
            last_error: device.last_error,
            last_connected_at: device.last_connected_at,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

/// Trimmed, non-empty text field.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Positive integer path id.
pub(crate) fn parse_device_id(raw: &str) -> Result<DeviceId, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(DeviceId)
        .ok_or_else(|| ApiError::validation("invalid device id"))
}

/// The caller's device, or 404 when it does not exist or belongs to someone else.
pub(crate) async fn owned_device(
    state: &AppState,
    user_id: UserId,
    id: DeviceId,
) -> Result<Device, ApiError> {
    state
        .storage
        .get_device(user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("device not found"))
}

/// Run CPU-bound work (password hashing) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, FluxbotError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(FluxbotError::Internal(format!("blocking task failed: {e}"))))?
        .map_err(ApiError)
}
