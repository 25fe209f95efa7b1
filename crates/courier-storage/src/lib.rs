// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier persistence core.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and atomic transactions exposing
//! typed access to peer state, read state, messages, the outgoing operation
//! log, the self-destruct schedule, the item cache, pinned lists, and
//! installed collections.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::{Database, Transaction};
