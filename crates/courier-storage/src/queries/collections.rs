// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Locally installed reference collections.
//!
//! These are the authoritative copies. Cached copies of collections the user
//! has not installed live in the item cache instead.

use std::collections::HashMap;

use courier_core::{CollectionId, CollectionInfo, CollectionItem, CollectionNamespace, CourierError};
use rusqlite::{params, OptionalExtension};

use super::{from_json, to_json};
use crate::database::{storage_err, Transaction};

impl Transaction<'_> {
    /// Installed collections of a namespace in display order.
    pub fn get_item_collection_infos(
        &self,
        namespace: CollectionNamespace,
    ) -> Result<Vec<CollectionInfo>, CourierError> {
        let mut stmt = self
            .sql()
            .prepare(
                "SELECT info FROM installed_collections WHERE namespace = ?1 ORDER BY position ASC",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![namespace.to_string()], |row| row.get::<_, String>(0))
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        rows.iter()
            .map(|text| from_json("installed collection info", text))
            .collect()
    }

    pub fn get_item_collection_info(
        &self,
        id: CollectionId,
    ) -> Result<Option<CollectionInfo>, CourierError> {
        let raw: Option<String> = self
            .sql()
            .query_row(
                "SELECT info FROM installed_collections WHERE namespace = ?1 AND collection_id = ?2",
                params![id.namespace.to_string(), id.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        raw.map(|text| from_json(&format!("installed collection {id}"), &text))
            .transpose()
    }

    pub fn get_item_collection_items(
        &self,
        id: CollectionId,
    ) -> Result<Vec<CollectionItem>, CourierError> {
        let raw: Option<String> = self
            .sql()
            .query_row(
                "SELECT items FROM installed_collections WHERE namespace = ?1 AND collection_id = ?2",
                params![id.namespace.to_string(), id.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        match raw {
            Some(text) => from_json(&format!("items of collection {id}"), &text),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the ordered set of installed collections of a namespace.
    ///
    /// Items of collections that stay installed are kept; collections missing
    /// from `infos` are removed with their items.
    pub fn replace_item_collection_infos(
        &self,
        namespace: CollectionNamespace,
        infos: &[CollectionInfo],
    ) -> Result<(), CourierError> {
        let ns = namespace.to_string();
        let existing_items: HashMap<i64, String> = {
            let mut stmt = self
                .sql()
                .prepare("SELECT collection_id, items FROM installed_collections WHERE namespace = ?1")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![ns], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(storage_err)?
                .collect::<Result<HashMap<_, _>, _>>()
                .map_err(storage_err)?;
            rows
        };

        self.sql()
            .execute("DELETE FROM installed_collections WHERE namespace = ?1", params![ns])
            .map_err(storage_err)?;

        for (position, info) in infos.iter().enumerate() {
            let text = to_json(&format!("installed collection {}", info.id), info)?;
            let items = existing_items
                .get(&info.id.id)
                .map(String::as_str)
                .unwrap_or("[]");
            self.sql()
                .execute(
                    "INSERT INTO installed_collections (namespace, collection_id, position, info, items)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![ns, info.id.id, position as i64, text, items],
                )
                .map_err(storage_err)?;
        }
        Ok(())
    }

    /// Replace the items of an installed collection. Returns `false` when the
    /// collection is not installed.
    pub fn replace_item_collection_items(
        &self,
        id: CollectionId,
        items: &[CollectionItem],
    ) -> Result<bool, CourierError> {
        let text = to_json(&format!("items of collection {id}"), items)?;
        let updated = self
            .sql()
            .execute(
                "UPDATE installed_collections SET items = ?3 WHERE namespace = ?1 AND collection_id = ?2",
                params![id.namespace.to_string(), id.id, text],
            )
            .map_err(storage_err)?;
        Ok(updated > 0)
    }

    pub fn remove_item_collection(&self, id: CollectionId) -> Result<bool, CourierError> {
        let removed = self
            .sql()
            .execute(
                "DELETE FROM installed_collections WHERE namespace = ?1 AND collection_id = ?2",
                params![id.namespace.to_string(), id.id],
            )
            .map_err(storage_err)?;
        Ok(removed > 0)
    }
}
