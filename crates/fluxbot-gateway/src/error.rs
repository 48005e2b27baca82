// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`FluxbotError`] onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fluxbot_core::FluxbotError;
use serde::Serialize;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A handler failure, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub FluxbotError);

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(FluxbotError::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(FluxbotError::NotFound(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FluxbotError::Validation(_) | FluxbotError::UnsupportedPlatform(_) => {
                StatusCode::BAD_REQUEST
            }
            FluxbotError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FluxbotError::NotFound(_) => StatusCode::NOT_FOUND,
            FluxbotError::Conflict(_) | FluxbotError::NotConnected(_) => StatusCode::CONFLICT,
            FluxbotError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            FluxbotError::Channel { .. } => StatusCode::BAD_GATEWAY,
            FluxbotError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            FluxbotError::Config(_) | FluxbotError::Storage { .. } | FluxbotError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            FluxbotError::Upstream { message, .. } => message.clone(),
            FluxbotError::Config(_) | FluxbotError::Storage { .. } | FluxbotError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<FluxbotError> for ApiError {
    fn from(err: FluxbotError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
