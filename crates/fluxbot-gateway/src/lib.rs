// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the FluxBot backend.
//!
//! Public routes cover registration, login, health, and the WhatsApp Cloud
//! webhook. Everything else sits behind the bearer-token middleware in
//! [`auth`], which resolves the caller's user id from a signed token without
//! touching storage.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod password;
pub mod server;
pub mod token;

pub use error::ApiError;
pub use password::Passwords;
pub use server::{AppState, GatewaySettings, build_router, start_server};
pub use token::TokenSigner;
