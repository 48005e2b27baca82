// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database test harness.
//!
//! `TestHarness` opens a fresh SQLite database in a temporary directory and
//! offers shortcuts for seeding users and devices and for polling device
//! status written by background event loops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fluxbot_config::model::{FluxbotConfig, StorageConfig};
use fluxbot_core::types::{Device, DeviceConfig, DeviceStatus, NewDevice, NewUser, Platform, User};
use fluxbot_core::{FluxbotError, StorageAdapter};
use fluxbot_storage::SqliteStorage;

pub struct TestHarness {
    /// SQLite storage on a temp database, removed on drop.
    pub storage: Arc<SqliteStorage>,
    pub config: FluxbotConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, FluxbotError> {
        Self::with_config(FluxbotConfig::default()).await
    }

    /// Uses `config` as given, except that storage points at a temp database.
    pub async fn with_config(mut config: FluxbotConfig) -> Result<Self, FluxbotError> {
        let temp_dir = tempfile::TempDir::new().map_err(FluxbotError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        config.session.auth_dir = temp_dir.path().join("auth").to_string_lossy().to_string();

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;

        Ok(Self {
            storage: Arc::new(storage),
            config,
            _temp_dir: temp_dir,
        })
    }

    pub fn storage_dyn(&self) -> Arc<dyn StorageAdapter> {
        Arc::clone(&self.storage) as Arc<dyn StorageAdapter>
    }

    /// A user with an active seven-day trial.
    pub async fn user(&self, email: &str) -> Result<User, FluxbotError> {
        self.storage
            .create_user(
                &NewUser {
                    name: "Test User".into(),
                    email: email.into(),
                    password_hash: "$argon2id$v=19$placeholder".into(),
                },
                1,
                Utc::now() + chrono::Duration::days(7),
            )
            .await
    }

    pub async fn device(
        &self,
        owner: &User,
        platform: Platform,
        config: serde_json::Value,
    ) -> Result<Device, FluxbotError> {
        self.storage
            .create_device(&NewDevice {
                user_id: owner.id,
                name: format!("{platform} device"),
                platform,
                config: DeviceConfig::from_value(config),
            })
            .await
    }

    /// Re-read a device from storage.
    pub async fn reload(&self, device: &Device) -> Result<Device, FluxbotError> {
        self.storage
            .get_device(device.user_id, device.id)
            .await?
            .ok_or_else(|| FluxbotError::NotFound(format!("device {}", device.id)))
    }

    /// Poll until the device reaches `status`, or fail after `within`.
    pub async fn wait_for_status(
        &self,
        device: &Device,
        status: DeviceStatus,
        within: Duration,
    ) -> Result<Device, FluxbotError> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let current = self.reload(device).await?;
            if current.status == status {
                return Ok(current);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FluxbotError::Timeout { duration: within });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
