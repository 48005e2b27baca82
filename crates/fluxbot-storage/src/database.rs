// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management: PRAGMA setup, migrations, and shutdown.
//!
//! All statements run on tokio-rusqlite's single background thread, so each
//! `call` closure executes atomically with respect to every other one.

use std::fmt::Display;
use std::path::Path;

use fluxbot_core::FluxbotError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite failure into [`FluxbotError::Storage`].
pub(crate) fn map_tr_err<E: Display>(e: tokio_rusqlite::Error<E>) -> FluxbotError {
    FluxbotError::storage(e)
}

/// Handle to the FluxBot SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, FluxbotError> {
        Self::open_with(path, true).await
    }

    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, FluxbotError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FluxbotError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(FluxbotError::storage)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// A private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, FluxbotError> {
        let conn = Connection::open_in_memory().await.map_err(FluxbotError::storage)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), FluxbotError> {
        self.conn
            .call(move |conn| -> Result<(), FluxbotError> {
                if wal_mode {
                    let mode: String = conn
                        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                        .map_err(FluxbotError::storage)?;
                    debug!(journal_mode = %mode, "journal mode set");
                }
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
                .map_err(FluxbotError::storage)?;
                migrations::run_migrations(conn)
            })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => map_tr_err(other),
            })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), FluxbotError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), FluxbotError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("fluxbot.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let plan: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT name FROM plans WHERE id = 1", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(plan, "Free Trial");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_does_not_reapply_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fluxbot.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();

        let plans: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(plans, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_enforced() {
        let db = Database::open_in_memory().await.unwrap();
        let result = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "INSERT INTO devices (user_id, name, platform, created_at, updated_at)
                     VALUES (999, 'ghost', 'whatsapp', 'x', 'x')",
                    [],
                )
            })
            .await;
        assert!(result.is_err(), "device without owner must be rejected");
    }
}
