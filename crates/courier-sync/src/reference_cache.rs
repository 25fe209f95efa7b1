// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference collections: installed copies plus a bounded cache of fetched ones.
//!
//! An installed collection is authoritative and never refreshed here. Anything
//! else lives in the item cache under [`CACHED_COLLECTIONS`] together with the
//! content hash it was fetched at, and is revalidated with a conditional
//! request. Remote item searches are cached the same way under
//! [`CACHED_QUERY_RESULTS`], keyed by the query text.

use std::collections::HashSet;
use std::sync::Arc;

use courier_core::{
    CollectionId, CollectionInfo, CollectionItem, CollectionNamespace, CollectionReference,
    CollectionSource, CollectionSpec, CourierError, ItemCacheEntryId, RemoteCollection,
    RemoteQueryResult,
};
use courier_storage::{Database, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Item cache collection holding fetched reference collections.
pub const CACHED_COLLECTIONS: i32 = 1;

/// Item cache collection holding remote search results.
pub const CACHED_QUERY_RESULTS: i32 = 2;

/// Default watermarks of the search result cache.
pub const QUERY_RESULTS_SPEC: CollectionSpec = CollectionSpec {
    low_water: 100,
    high_water: 200,
};

const COLLECTION_NAMESPACES: [CollectionNamespace; 2] =
    [CollectionNamespace::Stickers, CollectionNamespace::Masks];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedCollection {
    info: CollectionInfo,
    items: Vec<CollectionItem>,
}

/// A resolved collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionLookup {
    pub info: CollectionInfo,
    pub items: Vec<CollectionItem>,
    /// Whether this is the local installed copy.
    pub installed: bool,
}

/// Where [`ReferenceCollections::search_items`] looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchScope {
    pub installed: bool,
    pub remote: bool,
}

impl SearchScope {
    pub const ALL: Self = Self {
        installed: true,
        remote: true,
    };
    pub const INSTALLED: Self = Self {
        installed: true,
        remote: false,
    };
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundItem {
    pub file_id: i64,
    pub alt: String,
    /// The item belongs to an installed sticker collection.
    pub installed: bool,
}

pub(crate) fn cache_entry_id(id: CollectionId) -> ItemCacheEntryId {
    let namespace: i32 = match id.namespace {
        CollectionNamespace::Stickers => 0,
        CollectionNamespace::Masks => 1,
    };
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&namespace.to_be_bytes());
    key.extend_from_slice(&id.id.to_be_bytes());
    ItemCacheEntryId {
        collection: CACHED_COLLECTIONS,
        key,
    }
}

pub(crate) fn query_entry_id(query: &str) -> ItemCacheEntryId {
    ItemCacheEntryId {
        collection: CACHED_QUERY_RESULTS,
        key: query.as_bytes().to_vec(),
    }
}

enum Local {
    Installed(CollectionLookup),
    Cached(Option<(CachedCollection, i32)>),
}

fn local_lookup(txn: &Transaction<'_>, id: CollectionId) -> Result<Local, CourierError> {
    if let Some(info) = txn.get_item_collection_info(id)? {
        let items = txn.get_item_collection_items(id)?;
        return Ok(Local::Installed(CollectionLookup {
            info,
            items,
            installed: true,
        }));
    }

    let Some(entry) = txn.retrieve_item_cache_entry(&cache_entry_id(id))? else {
        return Ok(Local::Cached(None));
    };
    let cached: CachedCollection = serde_json::from_slice(&entry.payload)
        .map_err(|e| CourierError::codec(&format!("cached collection {id}"), e))?;
    Ok(Local::Cached(Some((cached, entry.content_hash))))
}

fn installed_by_short_name(
    txn: &Transaction<'_>,
    short_name: &str,
) -> Result<Option<CollectionLookup>, CourierError> {
    for namespace in COLLECTION_NAMESPACES {
        let found = txn
            .get_item_collection_infos(namespace)?
            .into_iter()
            .find(|info| info.short_name == short_name);
        if let Some(info) = found {
            let items = txn.get_item_collection_items(info.id)?;
            return Ok(Some(CollectionLookup {
                info,
                items,
                installed: true,
            }));
        }
    }
    Ok(None)
}

/// Items of installed sticker collections whose alt text is exactly `query`.
fn installed_matches(txn: &Transaction<'_>, query: &str) -> Result<Vec<FoundItem>, CourierError> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for info in txn.get_item_collection_infos(CollectionNamespace::Stickers)? {
        for item in txn.get_item_collection_items(info.id)? {
            if item.alt == query && seen.insert(item.file_id) {
                found.push(FoundItem {
                    file_id: item.file_id,
                    alt: item.alt,
                    installed: true,
                });
            }
        }
    }
    Ok(found)
}

fn cached_query_result(
    txn: &Transaction<'_>,
    query: &str,
) -> Result<Option<(Vec<CollectionItem>, i32)>, CourierError> {
    let Some(entry) = txn.retrieve_item_cache_entry(&query_entry_id(query))? else {
        return Ok(None);
    };
    let items: Vec<CollectionItem> = serde_json::from_slice(&entry.payload)
        .map_err(|e| CourierError::codec(&format!("cached results of {query:?}"), e))?;
    Ok(Some((items, entry.content_hash)))
}

/// Local hits first, then remote items not already among them.
fn merge_found(mut local: Vec<FoundItem>, remote: Vec<CollectionItem>) -> Vec<FoundItem> {
    let mut seen: HashSet<i64> = local.iter().map(|item| item.file_id).collect();
    for item in remote {
        if seen.insert(item.file_id) {
            local.push(FoundItem {
                file_id: item.file_id,
                alt: item.alt,
                installed: false,
            });
        }
    }
    local
}

fn from_cache(cached: CachedCollection) -> CollectionLookup {
    CollectionLookup {
        info: cached.info,
        items: cached.items,
        installed: false,
    }
}

/// Resolves reference collections against the store and a remote source.
pub struct ReferenceCollections<S: CollectionSource> {
    db: Database,
    source: Arc<S>,
    spec: CollectionSpec,
    query_spec: CollectionSpec,
}

impl<S: CollectionSource> ReferenceCollections<S> {
    pub fn new(db: Database, source: Arc<S>, spec: CollectionSpec) -> Self {
        Self {
            db,
            source,
            spec,
            query_spec: QUERY_RESULTS_SPEC,
        }
    }

    /// Override the watermarks of the search result cache.
    pub fn with_query_spec(mut self, query_spec: CollectionSpec) -> Self {
        self.query_spec = query_spec;
        self
    }

    /// Local lookup only: installed copy, then cached copy.
    pub async fn get(&self, id: CollectionId) -> Result<Option<CollectionLookup>, CourierError> {
        let local = self.db.transaction(move |txn| local_lookup(txn, id)).await?;
        Ok(match local {
            Local::Installed(lookup) => Some(lookup),
            Local::Cached(cached) => cached.map(|(cached, _)| from_cache(cached)),
        })
    }

    /// Resolve `id`, revalidating a cached copy with the remote source.
    ///
    /// Installed collections are returned without a request. A cached copy is
    /// sent as a conditional request with its hash unless `force_remote` asks
    /// for a full fetch. Remote failures fall back to the cached copy.
    pub async fn fetch_if_stale(
        &self,
        id: CollectionId,
        force_remote: bool,
    ) -> Result<Option<CollectionLookup>, CourierError> {
        let cached = match self.db.transaction(move |txn| local_lookup(txn, id)).await? {
            Local::Installed(lookup) => return Ok(Some(lookup)),
            Local::Cached(cached) => cached,
        };

        let known_hash = if force_remote {
            None
        } else {
            cached.as_ref().map(|(_, hash)| *hash)
        };

        match self.source.fetch_collection(id, known_hash).await {
            Ok(RemoteCollection::NotModified) => {
                debug!(collection = %id, "cached collection still current");
                Ok(cached.map(|(cached, _)| from_cache(cached)))
            }
            Ok(RemoteCollection::Updated { info, items }) => {
                if let Some((cached, hash)) = &cached {
                    if *hash == info.hash && cached.info == info && cached.items == items {
                        return Ok(Some(from_cache(cached.clone())));
                    }
                }
                self.store(id, CachedCollection { info, items }).await.map(Some)
            }
            Ok(RemoteCollection::NotFound) => {
                self.db
                    .transaction(move |txn| txn.remove_item_cache_entry(&cache_entry_id(id)))
                    .await?;
                debug!(collection = %id, "collection not found remotely, cache entry dropped");
                Ok(None)
            }
            Err(e) => {
                warn!(collection = %id, error = %e, "collection fetch failed, using cached copy");
                Ok(cached.map(|(cached, _)| from_cache(cached)))
            }
        }
    }

    /// Resolve a collection by id or short name.
    ///
    /// Short names have no cached form: unless a matching collection is
    /// installed they always go to the server, and a remote failure is
    /// returned to the caller.
    pub async fn fetch_by_reference(
        &self,
        reference: &CollectionReference,
        force_remote: bool,
    ) -> Result<Option<CollectionLookup>, CourierError> {
        let short_name = match reference {
            CollectionReference::Id(id) => return self.fetch_if_stale(*id, force_remote).await,
            CollectionReference::ShortName(name) => name.clone(),
        };

        let lookup_name = short_name.clone();
        if let Some(installed) = self
            .db
            .transaction(move |txn| installed_by_short_name(txn, &lookup_name))
            .await?
        {
            return Ok(Some(installed));
        }

        match self.source.fetch_collection_by_name(&short_name).await? {
            RemoteCollection::Updated { info, items } => {
                let id = info.id;
                self.store(id, CachedCollection { info, items }).await.map(Some)
            }
            RemoteCollection::NotModified | RemoteCollection::NotFound => {
                debug!(short_name = %short_name, "collection not found remotely");
                Ok(None)
            }
        }
    }

    /// Find items whose alt text is `query`.
    ///
    /// Installed sticker collections are searched locally. With a remote
    /// scope the cached result set is revalidated with its hash; a failed
    /// request serves the cached results.
    pub async fn search_items(
        &self,
        query: &str,
        scope: SearchScope,
    ) -> Result<Vec<FoundItem>, CourierError> {
        if !scope.installed && !scope.remote {
            return Ok(Vec::new());
        }

        let owned = query.to_string();
        let (local, cached) = self
            .db
            .transaction(move |txn| {
                let local = if scope.installed {
                    installed_matches(txn, &owned)?
                } else {
                    Vec::new()
                };
                Ok((local, cached_query_result(txn, &owned)?))
            })
            .await?;
        if !scope.remote {
            return Ok(local);
        }

        let known_hash = cached.as_ref().map(|(_, hash)| *hash);
        let remote = match self.source.search_items(query, known_hash).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(query, error = %e, "item search failed, using cached results");
                RemoteQueryResult::NotModified
            }
        };

        match remote {
            RemoteQueryResult::NotModified => {
                let cached_items = cached.map(|(items, _)| items).unwrap_or_default();
                Ok(merge_found(local, cached_items))
            }
            RemoteQueryResult::Updated { hash, items } => {
                let payload = serde_json::to_vec(&items)
                    .map_err(|e| CourierError::codec(&format!("cached results of {query:?}"), e))?;
                let spec = self.query_spec;
                let key = query_entry_id(query);
                self.db
                    .transaction(move |txn| txn.put_item_cache_entry(&key, &payload, hash, spec))
                    .await?;
                Ok(merge_found(local, items))
            }
        }
    }

    async fn store(
        &self,
        id: CollectionId,
        fetched: CachedCollection,
    ) -> Result<CollectionLookup, CourierError> {
        let spec = self.spec;
        let payload = serde_json::to_vec(&fetched)
            .map_err(|e| CourierError::codec(&format!("cached collection {id}"), e))?;
        let hash = fetched.info.hash;
        let installed = self
            .db
            .transaction(move |txn| {
                let evicted = txn.put_item_cache_entry(&cache_entry_id(id), &payload, hash, spec)?;
                if evicted > 0 {
                    debug!(evicted, "reference cache trimmed");
                }
                Ok(txn.get_item_collection_info(id)?.is_some())
            })
            .await?;
        Ok(CollectionLookup {
            info: fetched.info,
            items: fetched.items,
            installed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_layout() {
        let id = CollectionId {
            namespace: CollectionNamespace::Masks,
            id: 0x0102,
        };
        let entry = cache_entry_id(id);
        assert_eq!(entry.collection, CACHED_COLLECTIONS);
        assert_eq!(entry.key.len(), 12);
        assert_eq!(&entry.key[..4], &[0, 0, 0, 1]);
        assert_eq!(&entry.key[10..], &[1, 2]);
    }

    #[test]
    fn query_results_live_apart_from_collections() {
        let entry = query_entry_id("cat");
        assert_eq!(entry.collection, CACHED_QUERY_RESULTS);
        assert_ne!(CACHED_QUERY_RESULTS, CACHED_COLLECTIONS);
        assert_eq!(entry.key, b"cat".to_vec());
    }

    #[test]
    fn merged_results_keep_local_hits_first() {
        let local = vec![FoundItem {
            file_id: 1,
            alt: "x".into(),
            installed: true,
        }];
        let remote = vec![
            CollectionItem {
                index: 0,
                file_id: 2,
                alt: "x".into(),
            },
            CollectionItem {
                index: 1,
                file_id: 1,
                alt: "x".into(),
            },
        ];
        let merged = merge_found(local, remote);
        let ids: Vec<(i64, bool)> = merged.iter().map(|f| (f.file_id, f.installed)).collect();
        assert_eq!(ids, vec![(1, true), (2, false)]);
    }
}
