// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item cache with low/high watermark eviction.
//!
//! Every put and every retrieve moves the entry to the back of its
//! collection's access order. A put that pushes a collection above its high
//! watermark evicts from the front until the low watermark is reached.

use courier_core::{CacheEntry, CollectionSpec, CourierError, ItemCacheEntryId};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::database::{storage_err, Transaction};

impl Transaction<'_> {
    /// Insert or refresh an entry. Returns how many entries were evicted.
    pub fn put_item_cache_entry(
        &self,
        id: &ItemCacheEntryId,
        payload: &[u8],
        content_hash: i32,
        spec: CollectionSpec,
    ) -> Result<usize, CourierError> {
        spec.validate()?;
        let order = self.next_access_order(id.collection)?;
        self.sql()
            .execute(
                "INSERT INTO item_cache (collection, key, payload, content_hash, access_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, key) DO UPDATE SET
                     payload = excluded.payload,
                     content_hash = excluded.content_hash,
                     access_order = excluded.access_order",
                params![id.collection, id.key, payload, content_hash, order],
            )
            .map_err(storage_err)?;

        let count = self.item_cache_count(id.collection)?;
        if count <= spec.high_water {
            return Ok(0);
        }

        let excess = count.saturating_sub(spec.low_water);
        let evicted = self
            .sql()
            .execute(
                "DELETE FROM item_cache WHERE collection = ?1 AND key IN (
                     SELECT key FROM item_cache WHERE collection = ?1
                     ORDER BY access_order ASC LIMIT ?2)",
                params![id.collection, excess as i64],
            )
            .map_err(storage_err)?;
        debug!(collection = id.collection, evicted, "item cache trimmed to low watermark");
        Ok(evicted)
    }

    /// Look up an entry and mark it as most recently used.
    pub fn retrieve_item_cache_entry(
        &self,
        id: &ItemCacheEntryId,
    ) -> Result<Option<CacheEntry>, CourierError> {
        let found: Option<(Vec<u8>, i32)> = self
            .sql()
            .query_row(
                "SELECT payload, content_hash FROM item_cache WHERE collection = ?1 AND key = ?2",
                params![id.collection, id.key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage_err)?;
        let Some((payload, content_hash)) = found else {
            return Ok(None);
        };

        let order = self.next_access_order(id.collection)?;
        self.sql()
            .execute(
                "UPDATE item_cache SET access_order = ?3 WHERE collection = ?1 AND key = ?2",
                params![id.collection, id.key, order],
            )
            .map_err(storage_err)?;
        Ok(Some(CacheEntry {
            id: id.clone(),
            payload,
            content_hash,
        }))
    }

    /// Invalidate an entry. Returns whether it existed.
    pub fn remove_item_cache_entry(&self, id: &ItemCacheEntryId) -> Result<bool, CourierError> {
        let removed = self
            .sql()
            .execute(
                "DELETE FROM item_cache WHERE collection = ?1 AND key = ?2",
                params![id.collection, id.key],
            )
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    pub fn item_cache_count(&self, collection: i32) -> Result<usize, CourierError> {
        let count: i64 = self
            .sql()
            .query_row(
                "SELECT COUNT(*) FROM item_cache WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    fn next_access_order(&self, collection: i32) -> Result<i64, CourierError> {
        self.sql()
            .query_row(
                "SELECT COALESCE(MAX(access_order), 0) + 1 FROM item_cache WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(storage_err)
    }
}
