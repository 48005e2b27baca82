// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FluxbotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    DashboardOverview, Device, DeviceId, DeviceStatus, DeviceUpdate, Message, NewDevice,
    NewMessage, NewUser, Subscription, User, UserCredentials, UserId,
};

/// Adapter for the system of record.
///
/// Every device-scoped read or write that originates from a user request takes
/// the caller's [`UserId`]; a device owned by someone else behaves exactly like
/// a missing one.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), FluxbotError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), FluxbotError>;

    /// Current time as seen by the database, for liveness reporting.
    async fn database_time(&self) -> Result<String, FluxbotError>;

    // --- Users ---

    /// Creates a user together with a trial subscription that ends at
    /// `trial_end_at`. Fails with [`FluxbotError::Conflict`] on a duplicate email.
    async fn create_user(
        &self,
        user: &NewUser,
        plan_id: i64,
        trial_end_at: DateTime<Utc>,
    ) -> Result<User, FluxbotError>;

    async fn find_user_by_email(&self, email: &str)
    -> Result<Option<UserCredentials>, FluxbotError>;

    // --- Devices ---

    async fn create_device(&self, device: &NewDevice) -> Result<Device, FluxbotError>;

    /// Devices owned by `user_id`, newest first.
    async fn list_devices(&self, user_id: UserId) -> Result<Vec<Device>, FluxbotError>;

    async fn get_device(
        &self,
        user_id: UserId,
        id: DeviceId,
    ) -> Result<Option<Device>, FluxbotError>;

    /// Applies a partial update; `None` when the device is missing or not owned.
    async fn update_device(
        &self,
        user_id: UserId,
        id: DeviceId,
        update: &DeviceUpdate,
    ) -> Result<Option<Device>, FluxbotError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_device(&self, user_id: UserId, id: DeviceId) -> Result<bool, FluxbotError>;

    /// Writes a status transition. Refreshes `last_connected_at` only for
    /// [`DeviceStatus::Connected`]; always overwrites `last_error`.
    async fn update_device_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
        last_error: Option<&str>,
    ) -> Result<(), FluxbotError>;

    /// Resolves a cloud device by the `phoneNumberId` in its configuration.
    async fn find_cloud_device_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Device>, FluxbotError>;

    /// Marks every live-session device still recorded as connected or
    /// pending as disconnected. Returns the number of devices touched.
    async fn reset_live_devices(&self, reason: &str) -> Result<usize, FluxbotError>;

    // --- Messages ---

    /// Appends a message. Inbound messages also record their sender as a contact.
    async fn insert_message(&self, message: &NewMessage) -> Result<i64, FluxbotError>;

    /// Messages of a device in chronological order.
    async fn list_messages(
        &self,
        device_id: DeviceId,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, FluxbotError>;

    /// Dashboard counts; "today" starts at `day_start`.
    async fn dashboard_overview(
        &self,
        user_id: UserId,
        day_start: DateTime<Utc>,
    ) -> Result<DashboardOverview, FluxbotError>;

    // --- Subscriptions ---

    /// The user's most recent subscription. A trial whose end lies before
    /// `now` is transitioned to expired as part of this read.
    async fn current_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, FluxbotError>;
}
