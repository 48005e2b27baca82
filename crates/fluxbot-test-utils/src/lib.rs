// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for FluxBot integration tests.
//!
//! Mock adapters and a temp-database harness for fast, deterministic tests
//! without a WhatsApp bridge or the Cloud API.
//!
//! - [`MockClientFactory`] / [`MockWhatsAppClient`] - scriptable live clients
//! - [`MockCloudMessenger`] - captures Cloud API sends, optionally failing
//! - [`FaultyStorage`] - storage wrapper that can fail selected writes
//! - [`TestHarness`] - temp SQLite storage with user/device helpers

pub mod faulty_storage;
pub mod harness;
pub mod mock_client;
pub mod mock_cloud;

pub use faulty_storage::FaultyStorage;
pub use harness::TestHarness;
pub use mock_client::{CLOSED_REASON, ClientBehavior, MockClientFactory, MockWhatsAppClient};
pub use mock_cloud::{CloudSend, MockCloudMessenger};
