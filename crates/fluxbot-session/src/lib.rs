// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live device sessions for FluxBot.
//!
//! - [`BotRegistry`] maps device ids to the live session objects that can be
//!   torn down.
//! - [`DeviceSessionManager`] drives the device state machine and reflects
//!   client lifecycle events back into storage.
//! - [`InboundIngestor`] persists inbound chat messages from live sessions and
//!   Cloud API webhooks.

pub mod ingest;
pub mod manager;
pub mod registry;

pub use ingest::{IngestOutcome, InboundIngestor};
pub use manager::{DeviceSessionManager, SessionSettings};
pub use registry::{BotRegistry, BotSession, SessionHandle};
