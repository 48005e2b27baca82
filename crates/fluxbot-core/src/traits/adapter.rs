// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by the storage backend and the outbound messengers.

use async_trait::async_trait;

use crate::error::FluxbotError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health, and shutdown for a pluggable backend.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short identifier used in logs (`sqlite`, `whatsapp-cloud`).
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Probes the backend. `Err` means the probe itself could not run.
    async fn health_check(&self) -> Result<HealthStatus, FluxbotError>;

    /// Releases held resources. Called once when the server stops.
    async fn shutdown(&self) -> Result<(), FluxbotError>;
}
