// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device CRUD and status transitions.
//!
//! User-facing reads and writes are scoped by owner: a device that belongs to
//! another user is reported exactly like a missing one.

use chrono::Utc;
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{
    Device, DeviceConfig, DeviceId, DeviceStatus, DeviceUpdate, NewDevice, Platform, UserId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{get_enum, get_json_object, get_opt_ts, get_ts, ts};

const DEVICE_COLUMNS: &str = "id, user_id, name, platform, status, last_error, \
     last_connected_at, config, created_at, updated_at";

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: DeviceId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        name: row.get(2)?,
        platform: get_enum(row, 3)?,
        status: get_enum(row, 4)?,
        last_error: row.get(5)?,
        last_connected_at: get_opt_ts(row, 6)?,
        config: DeviceConfig(get_json_object(row, 7)?),
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

fn select_owned(conn: &Connection, user_id: i64, id: i64) -> rusqlite::Result<Option<Device>> {
    conn.query_row(
        &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1 AND user_id = ?2"),
        params![id, user_id],
        device_from_row,
    )
    .optional()
}

fn config_json(config: &DeviceConfig) -> Result<String, FluxbotError> {
    serde_json::to_string(&config.0).map_err(FluxbotError::storage)
}

/// Insert a device in the `disconnected` state.
pub async fn create_device(db: &Database, device: &NewDevice) -> Result<Device, FluxbotError> {
    let user_id = device.user_id.0;
    let name = device.name.clone();
    let platform = device.platform.as_str();
    let config = config_json(&device.config)?;
    let now = ts(Utc::now());

    db.connection()
        .call(move |conn| -> Result<Device, rusqlite::Error> {
            conn.execute(
                "INSERT INTO devices (user_id, name, platform, status, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'disconnected', ?4, ?5, ?5)",
                params![user_id, name, platform, config, now],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
                params![id],
                device_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Devices owned by a user, newest first.
pub async fn list_devices(db: &Database, user_id: UserId) -> Result<Vec<Device>, FluxbotError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Device>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![user_id.0], device_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_device(
    db: &Database,
    user_id: UserId,
    id: DeviceId,
) -> Result<Option<Device>, FluxbotError> {
    db.connection()
        .call(move |conn| select_owned(conn, user_id.0, id.0))
        .await
        .map_err(map_tr_err)
}

/// Apply the provided fields; absent fields keep their value.
pub async fn update_device(
    db: &Database,
    user_id: UserId,
    id: DeviceId,
    update: &DeviceUpdate,
) -> Result<Option<Device>, FluxbotError> {
    let name = update.name.clone();
    let config = update.config.as_ref().map(config_json).transpose()?;
    let now = ts(Utc::now());

    db.connection()
        .call(move |conn| -> Result<Option<Device>, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE devices
                 SET name = COALESCE(?1, name), config = COALESCE(?2, config), updated_at = ?3
                 WHERE id = ?4 AND user_id = ?5",
                params![name, config, now, id.0, user_id.0],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_owned(conn, user_id.0, id.0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an owned device. Messages and contacts cascade.
pub async fn delete_device(
    db: &Database,
    user_id: UserId,
    id: DeviceId,
) -> Result<bool, FluxbotError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let deleted = conn.execute(
                "DELETE FROM devices WHERE id = ?1 AND user_id = ?2",
                params![id.0, user_id.0],
            )?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a status transition.
///
/// `last_connected_at` moves only when entering `connected`; `last_error` is
/// always overwritten, including with NULL.
pub async fn update_device_status(
    db: &Database,
    id: DeviceId,
    status: DeviceStatus,
    last_error: Option<&str>,
) -> Result<(), FluxbotError> {
    let status = status.as_str();
    let last_error = last_error.map(str::to_string);
    let now = ts(Utc::now());

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE devices
                 SET status = ?1,
                     last_error = ?2,
                     last_connected_at = CASE WHEN ?1 = 'connected' THEN ?3 ELSE last_connected_at END,
                     updated_at = ?3
                 WHERE id = ?4",
                params![status, last_error, now, id.0],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The cloud device whose configured `phoneNumberId` matches, lowest id first.
pub async fn find_cloud_device_by_phone_number_id(
    db: &Database,
    phone_number_id: &str,
) -> Result<Option<Device>, FluxbotError> {
    let phone_number_id = phone_number_id.to_string();
    let platform = Platform::WhatsAppCloud.as_str();
    db.connection()
        .call(move |conn| -> Result<Option<Device>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM devices
                     WHERE platform = ?1 AND json_extract(config, '$.phoneNumberId') = ?2
                     ORDER BY id LIMIT 1"
                ),
                params![platform, phone_number_id],
                device_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark live-session devices left connected or pending by a previous process
/// as disconnected.
pub async fn reset_live_devices(db: &Database, reason: &str) -> Result<usize, FluxbotError> {
    let reason = reason.to_string();
    let now = ts(Utc::now());
    let platform = Platform::WhatsApp.as_str();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE devices SET status = 'disconnected', last_error = ?1, updated_at = ?2
                 WHERE platform = ?3 AND status IN ('connected', 'pending_qr')",
                params![reason, now, platform],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;
    use serde_json::json;

    fn new_device(user_id: UserId, name: &str, platform: Platform, config: serde_json::Value) -> NewDevice {
        NewDevice {
            user_id,
            name: name.into(),
            platform,
            config: DeviceConfig::from_value(config),
        }
    }

    #[tokio::test]
    async fn created_device_starts_disconnected() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;

        let device = create_device(
            &db,
            &new_device(user.id, "Support", Platform::WhatsApp, json!({"welcomeMessage": "hi"})),
        )
        .await
        .unwrap();
        assert_eq!(device.status, DeviceStatus::Disconnected);
        assert_eq!(device.platform, Platform::WhatsApp);
        assert_eq!(device.config.0["welcomeMessage"], "hi");
        assert!(device.last_connected_at.is_none());
    }

    #[tokio::test]
    async fn other_users_device_is_invisible() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = test_support::user(&db, "alice@example.com").await;
        let bob = test_support::user(&db, "bob@example.com").await;
        let device = create_device(&db, &new_device(alice.id, "A", Platform::WhatsApp, json!({})))
            .await
            .unwrap();

        assert!(get_device(&db, bob.id, device.id).await.unwrap().is_none());
        let update = DeviceUpdate {
            name: Some("stolen".into()),
            config: None,
        };
        assert!(update_device(&db, bob.id, device.id, &update).await.unwrap().is_none());
        assert!(!delete_device(&db, bob.id, device.id).await.unwrap());
        assert!(list_devices(&db, bob.id).await.unwrap().is_empty());

        let still = get_device(&db, alice.id, device.id).await.unwrap().unwrap();
        assert_eq!(still.name, "A");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;
        let first = create_device(&db, &new_device(user.id, "one", Platform::WhatsApp, json!({})))
            .await
            .unwrap();
        let second = create_device(&db, &new_device(user.id, "two", Platform::Telegram, json!({})))
            .await
            .unwrap();

        let ids: Vec<_> = list_devices(&db, user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;
        let device = create_device(
            &db,
            &new_device(user.id, "old", Platform::WhatsAppCloud, json!({"phoneNumberId": "1"})),
        )
        .await
        .unwrap();

        let renamed = update_device(
            &db,
            user.id,
            device.id,
            &DeviceUpdate {
                name: Some("new".into()),
                config: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.config.phone_number_id(), Some("1"));
    }

    #[tokio::test]
    async fn status_write_tracks_last_connected() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;
        let device = create_device(&db, &new_device(user.id, "d", Platform::WhatsApp, json!({})))
            .await
            .unwrap();

        update_device_status(&db, device.id, DeviceStatus::Connected, None).await.unwrap();
        let connected = get_device(&db, user.id, device.id).await.unwrap().unwrap();
        assert_eq!(connected.status, DeviceStatus::Connected);
        let stamp = connected.last_connected_at.expect("connected sets timestamp");

        update_device_status(&db, device.id, DeviceStatus::Error, Some("boom")).await.unwrap();
        let errored = get_device(&db, user.id, device.id).await.unwrap().unwrap();
        assert_eq!(errored.status, DeviceStatus::Error);
        assert_eq!(errored.last_error.as_deref(), Some("boom"));
        assert_eq!(errored.last_connected_at, Some(stamp));

        update_device_status(&db, device.id, DeviceStatus::Disconnected, None).await.unwrap();
        let cleared = get_device(&db, user.id, device.id).await.unwrap().unwrap();
        assert!(cleared.last_error.is_none());
    }

    #[tokio::test]
    async fn cloud_lookup_matches_phone_number_id() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;
        create_device(&db, &new_device(user.id, "web", Platform::WhatsApp, json!({"phoneNumberId": "555"})))
            .await
            .unwrap();
        let cloud = create_device(
            &db,
            &new_device(user.id, "cloud", Platform::WhatsAppCloud, json!({"phoneNumberId": "555"})),
        )
        .await
        .unwrap();

        let found = find_cloud_device_by_phone_number_id(&db, "555").await.unwrap().unwrap();
        assert_eq!(found.id, cloud.id);
        assert!(find_cloud_device_by_phone_number_id(&db, "999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_only_touches_live_whatsapp_devices() {
        let db = Database::open_in_memory().await.unwrap();
        let user = test_support::user(&db, "a@example.com").await;
        let web = create_device(&db, &new_device(user.id, "web", Platform::WhatsApp, json!({})))
            .await
            .unwrap();
        let pending = create_device(&db, &new_device(user.id, "qr", Platform::WhatsApp, json!({})))
            .await
            .unwrap();
        let cloud = create_device(&db, &new_device(user.id, "cloud", Platform::WhatsAppCloud, json!({})))
            .await
            .unwrap();
        update_device_status(&db, web.id, DeviceStatus::Connected, None).await.unwrap();
        update_device_status(&db, pending.id, DeviceStatus::PendingQr, None).await.unwrap();
        update_device_status(&db, cloud.id, DeviceStatus::Connected, None).await.unwrap();

        let touched = reset_live_devices(&db, "session lost on restart").await.unwrap();
        assert_eq!(touched, 2);

        let web = get_device(&db, user.id, web.id).await.unwrap().unwrap();
        assert_eq!(web.status, DeviceStatus::Disconnected);
        assert_eq!(web.last_error.as_deref(), Some("session lost on restart"));
        let cloud = get_device(&db, user.id, cloud.id).await.unwrap().unwrap();
        assert_eq!(cloud.status, DeviceStatus::Connected);
    }
}
