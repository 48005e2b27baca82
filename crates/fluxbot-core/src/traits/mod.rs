// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Storage and the outbound messengers extend the [`PluginAdapter`] base
//! trait and use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod client;
pub mod cloud;
pub mod storage;

pub use adapter::PluginAdapter;
pub use client::{ClientHandle, ClientSpec, WhatsAppClient, WhatsAppClientFactory};
pub use cloud::{CloudCredentials, CloudMessenger};
pub use storage::StorageAdapter;
