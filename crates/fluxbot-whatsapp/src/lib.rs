// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp adapters for FluxBot.
//!
//! - [`cloud`]: outbound text over the WhatsApp Cloud API.
//! - [`webhook`]: Cloud API webhook parsing, signature and challenge checks.
//! - [`bridge`]: WhatsApp Web sessions driven through an out-of-process
//!   bridge over WebSocket.

pub mod bridge;
pub mod cloud;
pub mod webhook;

pub use bridge::{BridgeClient, BridgeClientFactory};
pub use cloud::CloudApiClient;
pub use webhook::{
    SIGNATURE_HEADER, VerifyQuery, parse_webhook_messages, verify_challenge, verify_signature,
};
