// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock remote collection source.
//!
//! Holds the "server side" copy of each collection and answers conditional
//! requests the way the real server does: `NotModified` when the caller's
//! hash matches, the full contents otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{
    CollectionId, CollectionInfo, CollectionItem, CollectionSource, CourierError, RemoteCollection,
    RemoteQueryResult,
};

#[derive(Clone, Default)]
pub struct MockCollectionSource {
    collections: Arc<Mutex<HashMap<CollectionId, (CollectionInfo, Vec<CollectionItem>)>>>,
    requests: Arc<Mutex<Vec<(CollectionId, Option<i32>)>>>,
    name_requests: Arc<Mutex<Vec<String>>>,
    search_results: Arc<Mutex<HashMap<String, (i32, Vec<CollectionItem>)>>>,
    search_requests: Arc<Mutex<Vec<(String, Option<i32>)>>>,
    offline: Arc<Mutex<bool>>,
}

impl MockCollectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the server copy of a collection.
    pub async fn publish(&self, info: CollectionInfo, items: Vec<CollectionItem>) {
        self.collections.lock().await.insert(info.id, (info, items));
    }

    /// Publish (or replace) the server result set of a search query.
    pub async fn publish_search(&self, query: &str, hash: i32, items: Vec<CollectionItem>) {
        self.search_results
            .lock()
            .await
            .insert(query.to_string(), (hash, items));
    }

    /// Make every request fail with a remote error.
    pub async fn set_offline(&self, offline: bool) {
        *self.offline.lock().await = offline;
    }

    /// Requests seen so far as `(id, known_hash)`.
    pub async fn requests(&self) -> Vec<(CollectionId, Option<i32>)> {
        self.requests.lock().await.clone()
    }

    /// Short names looked up so far.
    pub async fn name_requests(&self) -> Vec<String> {
        self.name_requests.lock().await.clone()
    }

    /// Search requests seen so far as `(query, known_hash)`.
    pub async fn search_requests(&self) -> Vec<(String, Option<i32>)> {
        self.search_requests.lock().await.clone()
    }

    async fn check_online(&self, what: &str) -> Result<(), CourierError> {
        if *self.offline.lock().await {
            return Err(CourierError::Remote {
                message: format!("collection source offline while fetching {what}"),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionSource for MockCollectionSource {
    async fn fetch_collection(
        &self,
        id: CollectionId,
        known_hash: Option<i32>,
    ) -> Result<RemoteCollection, CourierError> {
        self.requests.lock().await.push((id, known_hash));
        self.check_online(&id.to_string()).await?;

        let collections = self.collections.lock().await;
        Ok(match collections.get(&id) {
            Some((info, _)) if known_hash == Some(info.hash) => RemoteCollection::NotModified,
            Some((info, items)) => RemoteCollection::Updated {
                info: info.clone(),
                items: items.clone(),
            },
            None => RemoteCollection::NotFound,
        })
    }

    async fn fetch_collection_by_name(
        &self,
        short_name: &str,
    ) -> Result<RemoteCollection, CourierError> {
        self.name_requests.lock().await.push(short_name.to_string());
        self.check_online(short_name).await?;

        let collections = self.collections.lock().await;
        Ok(collections
            .values()
            .find(|(info, _)| info.short_name == short_name)
            .map_or(RemoteCollection::NotFound, |(info, items)| {
                RemoteCollection::Updated {
                    info: info.clone(),
                    items: items.clone(),
                }
            }))
    }

    async fn search_items(
        &self,
        query: &str,
        known_hash: Option<i32>,
    ) -> Result<RemoteQueryResult, CourierError> {
        self.search_requests
            .lock()
            .await
            .push((query.to_string(), known_hash));
        self.check_online(query).await?;

        let results = self.search_results.lock().await;
        Ok(match results.get(query) {
            Some((hash, _)) if known_hash == Some(*hash) => RemoteQueryResult::NotModified,
            Some((hash, items)) => RemoteQueryResult::Updated {
                hash: *hash,
                items: items.clone(),
            },
            None => RemoteQueryResult::Updated {
                hash: 0,
                items: Vec::new(),
            },
        })
    }
}
