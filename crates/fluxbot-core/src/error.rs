// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for FluxBot.

use thiserror::Error;

/// The primary error type used across all FluxBot traits and core operations.
#[derive(Debug, Error)]
pub enum FluxbotError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Live messaging client errors (bridge connection, protocol, teardown).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller input rejected before any state was touched.
    #[error("{0}")]
    Validation(String),

    /// The entity does not exist, or is not owned by the caller.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("{0}")]
    Conflict(String),

    /// Missing, malformed, or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The device's platform has no session implementation.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The device has no live session to act on.
    #[error("device {0} is not connected")]
    NotConnected(i64),

    /// An upstream provider (e.g. the WhatsApp Cloud API) rejected the request.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FluxbotError {
    /// Wrap any displayable storage-layer failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            source: err.to_string().into(),
        }
    }

    /// Build a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }
}
