// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the storage, session, and gateway crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};

/// Identifier of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-assigned identifier of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Messenger,
}

/// Messaging provider a device integrates with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum Platform {
    /// WhatsApp Web, driven through a live client session.
    #[strum(serialize = "whatsapp")]
    #[serde(rename = "whatsapp")]
    WhatsApp,
    /// Accepted at creation; no session implementation exists.
    #[strum(serialize = "telegram")]
    #[serde(rename = "telegram")]
    Telegram,
    /// WhatsApp Cloud API; stateless credentials, no live session.
    #[strum(serialize = "whatsapp_cloud")]
    #[serde(rename = "whatsapp_cloud")]
    WhatsAppCloud,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Persisted connection state of a device.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Disconnected,
    PendingQr,
    Connected,
    Error,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Platform-specific settings stored with a device.
///
/// Opaque to the core apart from the Cloud API credentials; everything else
/// (`welcomeMessage`, `webhookUrl`, ...) is kept verbatim for the frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceConfig(pub Map<String, Value>);

impl DeviceConfig {
    /// Accepts any JSON object; other JSON values yield an empty config.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn phone_number_id(&self) -> Option<&str> {
        self.non_empty_str("phoneNumberId")
    }

    pub fn access_token(&self) -> Option<&str> {
        self.non_empty_str("accessToken")
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// A messaging endpoint owned by exactly one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub user_id: UserId,
    pub name: String,
    pub platform: Platform,
    pub status: DeviceStatus,
    pub last_error: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub config: DeviceConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a device.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub user_id: UserId,
    pub name: String,
    pub platform: Platform,
    pub config: DeviceConfig,
}

/// Partial update of a device's user-editable fields.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub config: Option<DeviceConfig>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.config.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Received,
    Sent,
}

/// A persisted chat message. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub device_id: DeviceId,
    pub user_id: UserId,
    pub direction: Direction,
    pub from_number: String,
    pub to_number: String,
    pub body: String,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub device_id: DeviceId,
    pub user_id: UserId,
    pub direction: Direction,
    pub from_number: String,
    pub to_number: String,
    pub body: String,
    pub status: MessageStatus,
    pub external_id: Option<String>,
}

impl NewMessage {
    /// An inbound message as received from a session or webhook.
    pub fn inbound(device_id: DeviceId, user_id: UserId, payload: InboundPayload) -> Self {
        Self {
            device_id,
            user_id,
            direction: Direction::Inbound,
            from_number: payload.from,
            to_number: payload.to,
            body: payload.body,
            status: MessageStatus::Received,
            external_id: payload.external_id,
        }
    }

    /// An outbound message accepted by the provider.
    pub fn outbound(
        device_id: DeviceId,
        user_id: UserId,
        from_number: impl Into<String>,
        to_number: impl Into<String>,
        body: impl Into<String>,
        external_id: MessageId,
    ) -> Self {
        Self {
            device_id,
            user_id,
            direction: Direction::Outbound,
            from_number: from_number.into(),
            to_number: to_number.into(),
            body: body.into(),
            status: MessageStatus::Sent,
            external_id: Some(external_id.0),
        }
    }
}

/// Raw content of an inbound chat message, before it is bound to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundPayload {
    pub from: String,
    pub to: String,
    pub body: String,
    pub external_id: Option<String>,
}

/// Lifecycle notifications emitted by a live messaging client.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The client wants a QR scan; the operator pairs out of band.
    QrPending,
    /// Informational state change reported by the client.
    StateChanged(String),
    /// The session is authenticated and usable.
    Ready,
    /// The session ended; the client is no longer usable.
    Disconnected { reason: Option<String> },
    /// A client-side failure that does not end the session by itself.
    Error { message: String },
    /// A chat message arrived on the session.
    MessageReceived(InboundPayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A user record together with its stored password hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A user's subscription row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: UserId,
    pub plan_id: i64,
    pub plan_name: Option<String>,
    pub status: SubscriptionStatus,
    pub trial_end_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// True when a trial's end has passed and the row should read as expired.
    pub fn trial_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trial
            && self.trial_end_at.is_some_and(|end| end < now)
    }
}

/// Aggregate counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub messages_today: i64,
    pub total_contacts: i64,
    pub devices_connected: i64,
}
