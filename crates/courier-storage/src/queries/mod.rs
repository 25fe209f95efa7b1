// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed record access on [`Transaction`](crate::Transaction).
//!
//! Each module adds an `impl Transaction<'_>` block for one table family.

pub mod collections;
pub mod item_cache;
pub mod messages;
pub mod operation_log;
pub mod peer_state;
pub mod pinned;
pub mod read_state;
pub mod schedule;

use std::fmt::Display;
use std::str::FromStr;

use courier_core::{ConversationId, CourierError, PeerNamespace};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Column values identifying a conversation.
pub(crate) fn peer_key(peer: ConversationId) -> (String, i64) {
    (peer.namespace.to_string(), peer.id)
}

pub(crate) fn peer_from_columns(namespace: &str, id: i64) -> Result<ConversationId, CourierError> {
    let namespace: PeerNamespace = parse_text("peer namespace", namespace)?;
    Ok(ConversationId::new(namespace, id))
}

/// Parse a text column holding an enum name.
pub(crate) fn parse_text<T>(context: &str, value: &str) -> Result<T, CourierError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| CourierError::codec(&format!("{context} `{value}`"), e))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(context: &str, value: &T) -> Result<String, CourierError> {
    serde_json::to_string(value).map_err(|e| CourierError::codec(context, e))
}

pub(crate) fn from_json<T: DeserializeOwned>(context: &str, text: &str) -> Result<T, CourierError> {
    serde_json::from_str(text).map_err(|e| CourierError::codec(context, e))
}
