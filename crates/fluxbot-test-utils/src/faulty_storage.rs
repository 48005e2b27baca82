// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper that fails selected operations on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fluxbot_core::types::{
    AdapterType, DashboardOverview, Device, DeviceId, DeviceStatus, DeviceUpdate, HealthStatus,
    Message, NewDevice, NewMessage, NewUser, Subscription, User, UserCredentials, UserId,
};
use fluxbot_core::{FluxbotError, PluginAdapter, StorageAdapter};

/// Delegates to an inner adapter unless a fault is switched on.
pub struct FaultyStorage {
    inner: Arc<dyn StorageAdapter>,
    fail_status_writes: AtomicBool,
    fail_message_inserts: AtomicBool,
    status_attempts: AtomicUsize,
}

impl FaultyStorage {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> Self {
        Self {
            inner,
            fail_status_writes: AtomicBool::new(false),
            fail_message_inserts: AtomicBool::new(false),
            status_attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_message_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of `update_device_status` calls, failed or not.
    pub fn status_attempts(&self) -> usize {
        self.status_attempts.load(Ordering::SeqCst)
    }

    fn injected(what: &str) -> FluxbotError {
        FluxbotError::storage(format!("injected fault: {what}"))
    }
}

#[async_trait]
impl PluginAdapter for FaultyStorage {
    fn name(&self) -> &str {
        "faulty"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, FluxbotError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), FluxbotError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for FaultyStorage {
    async fn initialize(&self) -> Result<(), FluxbotError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), FluxbotError> {
        self.inner.close().await
    }

    async fn database_time(&self) -> Result<String, FluxbotError> {
        self.inner.database_time().await
    }

    async fn create_user(
        &self,
        user: &NewUser,
        plan_id: i64,
        trial_end_at: DateTime<Utc>,
    ) -> Result<User, FluxbotError> {
        self.inner.create_user(user, plan_id, trial_end_at).await
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, FluxbotError> {
        self.inner.find_user_by_email(email).await
    }

    async fn create_device(&self, device: &NewDevice) -> Result<Device, FluxbotError> {
        self.inner.create_device(device).await
    }

    async fn list_devices(&self, user_id: UserId) -> Result<Vec<Device>, FluxbotError> {
        self.inner.list_devices(user_id).await
    }

    async fn get_device(
        &self,
        user_id: UserId,
        id: DeviceId,
    ) -> Result<Option<Device>, FluxbotError> {
        self.inner.get_device(user_id, id).await
    }

    async fn update_device(
        &self,
        user_id: UserId,
        id: DeviceId,
        update: &DeviceUpdate,
    ) -> Result<Option<Device>, FluxbotError> {
        self.inner.update_device(user_id, id, update).await
    }

    async fn delete_device(&self, user_id: UserId, id: DeviceId) -> Result<bool, FluxbotError> {
        self.inner.delete_device(user_id, id).await
    }

    async fn update_device_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
        last_error: Option<&str>,
    ) -> Result<(), FluxbotError> {
        self.status_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("update_device_status"));
        }
        self.inner.update_device_status(id, status, last_error).await
    }

    async fn find_cloud_device_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Device>, FluxbotError> {
        self.inner
            .find_cloud_device_by_phone_number_id(phone_number_id)
            .await
    }

    async fn reset_live_devices(&self, reason: &str) -> Result<usize, FluxbotError> {
        self.inner.reset_live_devices(reason).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<i64, FluxbotError> {
        if self.fail_message_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected("insert_message"));
        }
        self.inner.insert_message(message).await
    }

    async fn list_messages(
        &self,
        device_id: DeviceId,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, FluxbotError> {
        self.inner.list_messages(device_id, limit).await
    }

    async fn dashboard_overview(
        &self,
        user_id: UserId,
        day_start: DateTime<Utc>,
    ) -> Result<DashboardOverview, FluxbotError> {
        self.inner.dashboard_overview(user_id, day_start).await
    }

    async fn current_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, FluxbotError> {
        self.inner.current_subscription(user_id, now).await
    }
}
