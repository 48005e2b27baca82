// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health, dashboard, and subscription endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{NaiveTime, Utc};
use fluxbot_core::types::{DashboardOverview, Subscription};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    match state.storage.database_time().await {
        Ok(db_time) => Json(json!({"status": "ok", "dbTime": db_time})).into_response(),
        Err(e) => {
            error!(error = %e, "health check could not reach the database");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "error": "database unavailable"})),
            )
                .into_response()
        }
    }
}

/// GET /dashboard/overview
///
/// "Today" starts at UTC midnight.
pub async fn dashboard_overview(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let day_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let overview = state.storage.dashboard_overview(user_id, day_start).await?;
    Ok(Json(overview))
}

/// GET /subscription/me
///
/// Reading a lapsed trial marks it expired.
pub async fn subscription_me(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state
        .storage
        .current_subscription(user_id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("subscription not found"))?;
    Ok(Json(SubscriptionResponse { subscription }))
}
