// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription reads with lazy trial expiry.

use chrono::{DateTime, Utc};
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{Subscription, SubscriptionStatus, UserId};
use rusqlite::{OptionalExtension, params};
use tracing::info;

use crate::database::{Database, map_tr_err};
use crate::queries::{get_enum, get_opt_ts, get_ts};

/// The user's most recently created subscription.
///
/// A `trial` whose end lies before `now` is flipped to `expired` inside the
/// same call. The update is conditional on the row still being `trial`, so
/// concurrent readers persist the transition once.
pub async fn current_subscription(
    db: &Database,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>, FluxbotError> {
    let (sub, expired_now) = db
        .connection()
        .call(move |conn| -> Result<(Option<Subscription>, bool), rusqlite::Error> {
            let current = conn
                .query_row(
                    "SELECT s.id, s.user_id, s.plan_id, p.name, s.status, s.trial_end_at,
                            s.current_period_start, s.created_at
                     FROM subscriptions s
                     LEFT JOIN plans p ON p.id = s.plan_id
                     WHERE s.user_id = ?1
                     ORDER BY s.created_at DESC, s.id DESC
                     LIMIT 1",
                    params![user_id.0],
                    |row| {
                        Ok(Subscription {
                            id: row.get(0)?,
                            user_id: UserId(row.get(1)?),
                            plan_id: row.get(2)?,
                            plan_name: row.get(3)?,
                            status: get_enum(row, 4)?,
                            trial_end_at: get_opt_ts(row, 5)?,
                            current_period_start: get_opt_ts(row, 6)?,
                            created_at: get_ts(row, 7)?,
                        })
                    },
                )
                .optional()?;

            let Some(mut sub) = current else {
                return Ok((None, false));
            };
            let mut expired_now = false;
            if sub.trial_lapsed(now) {
                expired_now = conn.execute(
                    "UPDATE subscriptions SET status = 'expired' WHERE id = ?1 AND status = 'trial'",
                    params![sub.id],
                )? > 0;
                sub.status = SubscriptionStatus::Expired;
            }
            Ok((Some(sub), expired_now))
        })
        .await
        .map_err(map_tr_err)?;

    if expired_now && let Some(sub) = &sub {
        info!(user_id = %user_id, subscription_id = sub.id, "trial expired");
    }
    Ok(sub)
}
