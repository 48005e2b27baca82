// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User accounts.

use chrono::{DateTime, Utc};
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{NewUser, User, UserCredentials, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{is_constraint_violation, ts};

/// Insert a user and their trial subscription in one transaction.
///
/// Returns [`FluxbotError::Conflict`] when the email is already taken; nothing
/// is written in that case.
pub async fn create_user_with_trial(
    db: &Database,
    user: &NewUser,
    plan_id: i64,
    trial_end_at: DateTime<Utc>,
) -> Result<User, FluxbotError> {
    let new = user.clone();
    let now = ts(Utc::now());
    let trial_end = ts(trial_end_at);

    let id = db
        .connection()
        .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
            let tx = conn.transaction()?;
            match tx.execute(
                "INSERT INTO users (name, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![new.name, new.email, new.password_hash, now],
            ) {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => return Ok(None),
                Err(e) => return Err(e),
            }
            let user_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO subscriptions
                   (user_id, plan_id, status, trial_end_at, current_period_start, created_at)
                 VALUES (?1, ?2, 'trial', ?3, ?4, ?4)",
                params![user_id, plan_id, trial_end, now],
            )?;
            tx.commit()?;
            Ok(Some(user_id))
        })
        .await
        .map_err(map_tr_err)?;

    match id {
        Some(id) => Ok(User {
            id: UserId(id),
            name: user.name.clone(),
            email: user.email.clone(),
        }),
        None => Err(FluxbotError::Conflict("email already registered".into())),
    }
}

pub async fn find_user_by_email(
    db: &Database,
    email: &str,
) -> Result<Option<UserCredentials>, FluxbotError> {
    let email = email.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<UserCredentials>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, email, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserCredentials {
                        user: User {
                            id: UserId(row.get(0)?),
                            name: row.get(1)?,
                            email: row.get(2)?,
                        },
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
