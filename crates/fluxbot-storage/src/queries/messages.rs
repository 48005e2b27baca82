// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log, contacts, and dashboard aggregates.

use chrono::{DateTime, Utc};
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{
    DashboardOverview, DeviceId, Direction, Message, NewMessage, UserId,
};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{get_enum, get_ts, ts};

/// Append a message. An inbound message also upserts its sender as a contact
/// of the owning user, in the same transaction.
pub async fn insert_message(db: &Database, message: &NewMessage) -> Result<i64, FluxbotError> {
    let msg = message.clone();
    let now = ts(Utc::now());

    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages
                   (device_id, user_id, direction, from_number, to_number, body, status, external_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.device_id.0,
                    msg.user_id.0,
                    msg.direction.to_string(),
                    msg.from_number,
                    msg.to_number,
                    msg.body,
                    msg.status.to_string(),
                    msg.external_id,
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();

            if msg.direction == Direction::Inbound && !msg.from_number.is_empty() {
                tx.execute(
                    "INSERT INTO contacts (user_id, device_id, endpoint, first_seen_at, last_seen_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT (user_id, endpoint)
                     DO UPDATE SET device_id = excluded.device_id, last_seen_at = excluded.last_seen_at",
                    params![msg.user_id.0, msg.device_id.0, msg.from_number, now],
                )?;
            }

            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a device in chronological order, optionally capped to the
/// most recent `limit`.
pub async fn list_messages(
    db: &Database,
    device_id: DeviceId,
    limit: Option<i64>,
) -> Result<Vec<Message>, FluxbotError> {
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, user_id, direction, from_number, to_number, body,
                        status, external_id, created_at
                 FROM (SELECT * FROM messages WHERE device_id = ?1
                       ORDER BY created_at DESC, id DESC LIMIT ?2)
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![device_id.0, limit], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    device_id: DeviceId(row.get(1)?),
                    user_id: UserId(row.get(2)?),
                    direction: get_enum(row, 3)?,
                    from_number: row.get(4)?,
                    to_number: row.get(5)?,
                    body: row.get(6)?,
                    status: get_enum(row, 7)?,
                    external_id: row.get(8)?,
                    created_at: get_ts(row, 9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn dashboard_overview(
    db: &Database,
    user_id: UserId,
    day_start: DateTime<Utc>,
) -> Result<DashboardOverview, FluxbotError> {
    let day_start = ts(day_start);
    db.connection()
        .call(move |conn| -> Result<DashboardOverview, rusqlite::Error> {
            conn.query_row(
                "SELECT
                   (SELECT COUNT(*) FROM messages WHERE user_id = ?1 AND created_at >= ?2),
                   (SELECT COUNT(*) FROM contacts WHERE user_id = ?1),
                   (SELECT COUNT(*) FROM devices WHERE user_id = ?1 AND status = 'connected')",
                params![user_id.0, day_start],
                |row| {
                    Ok(DashboardOverview {
                        messages_today: row.get(0)?,
                        total_contacts: row.get(1)?,
                        devices_connected: row.get(2)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}
