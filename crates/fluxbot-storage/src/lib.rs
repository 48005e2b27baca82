// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the FluxBot backend.
//!
//! Embedded migrations, a single-writer connection via `tokio-rusqlite`, and
//! typed queries for users, devices, messages, contacts, and subscriptions.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
