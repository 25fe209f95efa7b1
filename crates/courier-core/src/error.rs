// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier persistence core.

use thiserror::Error;

/// The primary error type returned by the store, the sync operations, and
/// the external collaborator traits.
///
/// Only [`CourierError::Storage`] is expected to reach callers during normal
/// operation. Terminated-session rejections, cache misses, and stale cache
/// entries are ordinary control flow and never surface as errors.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, bad watermarks, bad backoff bounds).
    #[error("configuration error: {0}")]
    Config(String),

    /// The transaction could not commit. Safe to retry; nothing was applied.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A persisted blob could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// A session state machine event that is not legal in the current state.
    #[error("invalid session transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// A remote collaborator (collection source, delivery) failed.
    #[error("remote error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CourierError::Storage {
            source: source.into(),
        }
    }

    /// Builds a codec error from a serde failure.
    pub fn codec(context: &str, err: impl std::fmt::Display) -> Self {
        CourierError::Codec {
            message: format!("{context}: {err}"),
        }
    }

    /// Whether the failed operation may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CourierError::Storage { .. } | CourierError::Remote { .. })
    }
}
