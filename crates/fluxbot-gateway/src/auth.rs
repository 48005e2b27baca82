// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication middleware.
//!
//! Rejects with 401 when the `Authorization: Bearer <token>` header is
//! missing or the token fails verification. On success the caller's
//! [`AuthUser`] is placed in the request extensions for handlers.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use fluxbot_core::{FluxbotError, UserId};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

fn bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer(&request) else {
        return ApiError(FluxbotError::Unauthorized("missing token".into())).into_response();
    };

    match state.tokens.verify(token, Utc::now()) {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthUser(user_id));
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "bearer token rejected");
            ApiError(e).into_response()
        }
    }
}
