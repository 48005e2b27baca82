// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use fluxbot_config::model::StorageConfig;
use fluxbot_core::types::{
    DashboardOverview, Device, DeviceId, DeviceStatus, DeviceUpdate, Message, NewDevice,
    NewMessage, NewUser, Subscription, User, UserCredentials, UserId,
};
use fluxbot_core::{AdapterType, FluxbotError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// operation fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, FluxbotError> {
        self.db
            .get()
            .ok_or_else(|| FluxbotError::storage("storage not initialized, call initialize() first"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, FluxbotError> {
        self.database_time().await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FluxbotError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), FluxbotError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| FluxbotError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), FluxbotError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn database_time(&self) -> Result<String, FluxbotError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')", [], |row| {
                    row.get(0)
                })
            })
            .await
            .map_err(map_tr_err)
    }

    // --- Users ---

    async fn create_user(
        &self,
        user: &NewUser,
        plan_id: i64,
        trial_end_at: DateTime<Utc>,
    ) -> Result<User, FluxbotError> {
        queries::users::create_user_with_trial(self.db()?, user, plan_id, trial_end_at).await
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, FluxbotError> {
        queries::users::find_user_by_email(self.db()?, email).await
    }

    // --- Devices ---

    async fn create_device(&self, device: &NewDevice) -> Result<Device, FluxbotError> {
        queries::devices::create_device(self.db()?, device).await
    }

    async fn list_devices(&self, user_id: UserId) -> Result<Vec<Device>, FluxbotError> {
        queries::devices::list_devices(self.db()?, user_id).await
    }

    async fn get_device(
        &self,
        user_id: UserId,
        id: DeviceId,
    ) -> Result<Option<Device>, FluxbotError> {
        queries::devices::get_device(self.db()?, user_id, id).await
    }

    async fn update_device(
        &self,
        user_id: UserId,
        id: DeviceId,
        update: &DeviceUpdate,
    ) -> Result<Option<Device>, FluxbotError> {
        queries::devices::update_device(self.db()?, user_id, id, update).await
    }

    async fn delete_device(&self, user_id: UserId, id: DeviceId) -> Result<bool, FluxbotError> {
        queries::devices::delete_device(self.db()?, user_id, id).await
    }

    async fn update_device_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
        last_error: Option<&str>,
    ) -> Result<(), FluxbotError> {
        queries::devices::update_device_status(self.db()?, id, status, last_error).await
    }

    async fn find_cloud_device_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Device>, FluxbotError> {
        queries::devices::find_cloud_device_by_phone_number_id(self.db()?, phone_number_id).await
    }

    async fn reset_live_devices(&self, reason: &str) -> Result<usize, FluxbotError> {
        queries::devices::reset_live_devices(self.db()?, reason).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &NewMessage) -> Result<i64, FluxbotError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn list_messages(
        &self,
        device_id: DeviceId,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, FluxbotError> {
        queries::messages::list_messages(self.db()?, device_id, limit).await
    }

    async fn dashboard_overview(
        &self,
        user_id: UserId,
        day_start: DateTime<Utc>,
    ) -> Result<DashboardOverview, FluxbotError> {
        queries::messages::dashboard_overview(self.db()?, user_id, day_start).await
    }

    // --- Subscriptions ---

    async fn current_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, FluxbotError> {
        queries::subscriptions::current_subscription(self.db()?, user_id, now).await
    }
}
