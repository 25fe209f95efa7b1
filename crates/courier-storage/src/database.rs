// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All transactions are serialized through tokio-rusqlite's single background
//! thread. `Database` IS the single writer: clones share that one thread.
//! Do NOT open additional connections for writes.

use std::path::Path;
use std::time::Duration;

use courier_config::model::StorageConfig;
use courier_core::CourierError;
use rusqlite::TransactionBehavior;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Handle to the durable store.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

/// Typed read/write access to the store, valid for the duration of one
/// [`Database::transaction`] body.
///
/// The record accessors live in [`crate::queries`].
pub struct Transaction<'conn> {
    pub(crate) tx: rusqlite::Transaction<'conn>,
}

impl Transaction<'_> {
    /// The underlying SQLite transaction.
    pub(crate) fn sql(&self) -> &rusqlite::Connection {
        &self.tx
    }
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode and default settings.
    pub async fn open(path: &str) -> Result<Self, CourierError> {
        Self::open_with_config(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the database described by a [`StorageConfig`], creating the parent
    /// directory when needed, then run pending migrations.
    pub async fn open_with_config(config: &StorageConfig) -> Result<Self, CourierError> {
        if let Some(parent) = Path::new(&config.database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(CourierError::storage)?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| CourierError::storage(e.to_string()))?;
        let db = Self { conn };
        db.initialize(config.wal_mode, config.busy_timeout_ms).await?;

        info!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| CourierError::storage(e.to_string()))?;
        let db = Self { conn };
        db.initialize(false, 0).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool, busy_timeout_ms: u64) -> Result<(), CourierError> {
        self.conn
            .call(move |conn| -> Result<(), CourierError> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")
                        .map_err(storage_err)?;
                    conn.execute_batch("PRAGMA synchronous = NORMAL;")
                        .map_err(storage_err)?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")
                    .map_err(storage_err)?;
                conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
                    .map_err(storage_err)?;
                run_migrations(conn)
            })
            .await
            .map_err(map_tr_err)?;
        debug!("migrations applied");
        Ok(())
    }

    /// Run `body` inside one SQLite `IMMEDIATE` transaction.
    ///
    /// `Ok` commits; `Err` rolls back and is returned unchanged. A failed
    /// commit surfaces as [`CourierError::Storage`] with nothing applied.
    /// Bodies run one at a time on the connection thread, so every read inside
    /// `body` observes the latest committed state.
    pub async fn transaction<F, T>(&self, body: F) -> Result<T, CourierError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, CourierError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<T, CourierError> {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(storage_err)?;
                let txn = Transaction { tx };
                let value = body(&txn)?;
                txn.tx.commit().map_err(storage_err)?;
                Ok(value)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| -> Result<(), CourierError> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                    .map_err(storage_err)
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| CourierError::storage(e.to_string()))?;
        debug!("database closed");
        Ok(())
    }
}

/// Convert a rusqlite error into [`CourierError::Storage`].
pub(crate) fn storage_err(e: rusqlite::Error) -> CourierError {
    CourierError::storage(e)
}

/// Unwrap a tokio-rusqlite call error. Errors raised by the closure pass
/// through; connection failures become [`CourierError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<CourierError>) -> CourierError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => CourierError::storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_directory_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: i64 = db
            .transaction(|txn| {
                txn.sql()
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'operation_log'",
                        [],
                        |row| row.get(0),
                    )
                    .map_err(storage_err)
            })
            .await
            .unwrap();
        assert_eq!(tables, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_does_not_rerun_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courier.db");
        let path = path.to_str().unwrap().to_string();

        Database::open(&path).await.unwrap().close().await.unwrap();
        let db = Database::open(&path).await.unwrap();
        let applied: i64 = db
            .transaction(|txn| {
                txn.sql()
                    .query_row("SELECT COUNT(*) FROM refinery_schema_history", [], |row| {
                        row.get(0)
                    })
                    .map_err(storage_err)
            })
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn failing_body_rolls_back() {
        let db = Database::open_in_memory().await.unwrap();
        let result: Result<(), CourierError> = db
            .transaction(|txn| {
                txn.sql()
                    .execute("INSERT INTO counters (name, value) VALUES ('rollback_marker', 1)", [])
                    .map_err(storage_err)?;
                Err(CourierError::Internal("abort".into()))
            })
            .await;
        assert!(matches!(result, Err(CourierError::Internal(_))));

        let count: i64 = db
            .transaction(|txn| {
                txn.sql()
                    .query_row("SELECT COUNT(*) FROM counters WHERE name = 'rollback_marker'", [], |row| {
                        row.get(0)
                    })
                    .map_err(storage_err)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
