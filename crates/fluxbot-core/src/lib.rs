// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for FluxBot.
//!
//! Provides the error type, domain types, and adapter traits shared by the
//! storage, session, WhatsApp, and gateway crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FluxbotError;
pub use types::{
    AdapterType, Device, DeviceId, DeviceStatus, HealthStatus, LifecycleEvent, MessageId,
    Platform, UserId,
};

pub use traits::{
    ClientHandle, ClientSpec, CloudCredentials, CloudMessenger, PluginAdapter, StorageAdapter,
    WhatsAppClient, WhatsAppClientFactory,
};
