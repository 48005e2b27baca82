// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account registration and login.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use fluxbot_core::FluxbotError;
use fluxbot_core::types::{NewUser, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{blocking, present};
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// POST /auth/register
///
/// Creates the user together with a trial subscription and returns a token.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let (Some(name), Some(email), Some(password)) = (
        present(body.name),
        present(body.email),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("name, email and password are required"));
    };

    let passwords = state.passwords.clone();
    let password_hash = blocking(move || passwords.hash(&password)).await?;

    let now = Utc::now();
    let trial_end_at = now + Duration::days(i64::from(state.settings.subscription.trial_days));
    let user = state
        .storage
        .create_user(
            &NewUser {
                name,
                email,
                password_hash,
            },
            state.settings.subscription.plan_id,
            trial_end_at,
        )
        .await?;

    let token = state.tokens.issue(user.id, now)?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(body) = payload?;
    let (Some(email), Some(password)) = (
        present(body.email),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("email and password are required"));
    };

    let bad_credentials = || ApiError(FluxbotError::Unauthorized("invalid credentials".into()));
    let Some(credentials) = state.storage.find_user_by_email(&email).await? else {
        return Err(bad_credentials());
    };

    let passwords = state.passwords.clone();
    let stored = credentials.password_hash.clone();
    let ok = blocking(move || Ok(passwords.verify(&password, &stored))).await?;
    if !ok {
        return Err(bad_credentials());
    }

    let token = state.tokens.issue(credentials.user.id, Utc::now())?;
    Ok(Json(AuthResponse {
        token,
        user: credentials.user,
    }))
}
