// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote source of reference collections.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{CollectionId, CollectionInfo, CollectionItem};

/// Result of a conditional collection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCollection {
    /// The collection still matches the hash the caller sent.
    NotModified,
    /// Full contents at a new hash.
    Updated {
        info: CollectionInfo,
        items: Vec<CollectionItem>,
    },
    /// The server does not know the collection.
    NotFound,
}

/// Result of a conditional item search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteQueryResult {
    /// The result set still matches the hash the caller sent.
    NotModified,
    /// Full result set at a new hash.
    Updated {
        hash: i32,
        items: Vec<CollectionItem>,
    },
}

/// Fetches collections from the server.
///
/// When `known_hash` is set the implementation should issue the cheap
/// conditional request and answer [`RemoteCollection::NotModified`] if the
/// server-side hash still matches.
#[async_trait]
pub trait CollectionSource: Send + Sync + 'static {
    async fn fetch_collection(
        &self,
        id: CollectionId,
        known_hash: Option<i32>,
    ) -> Result<RemoteCollection, CourierError>;

    /// Resolve a collection by its short name. Always a full fetch.
    async fn fetch_collection_by_name(
        &self,
        short_name: &str,
    ) -> Result<RemoteCollection, CourierError>;

    /// Items whose alt text matches `query`, across all collections.
    async fn search_items(
        &self,
        query: &str,
        known_hash: Option<i32>,
    ) -> Result<RemoteQueryResult, CourierError>;
}
