// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered pinned chat lists per chat list group.

use courier_core::{ChatListGroupId, CourierError, PinnedItemId};
use rusqlite::{params, OptionalExtension};

use super::{from_json, to_json};
use crate::database::{storage_err, Transaction};

impl Transaction<'_> {
    pub fn get_pinned_item_ids(&self, group: ChatListGroupId) -> Result<Vec<PinnedItemId>, CourierError> {
        let raw: Option<String> = self
            .sql()
            .query_row(
                "SELECT items FROM pinned_items WHERE group_id = ?1",
                params![group.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        match raw {
            Some(text) => from_json(&format!("pinned items of group {}", group.0), &text),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_pinned_item_ids(
        &self,
        group: ChatListGroupId,
        items: &[PinnedItemId],
    ) -> Result<(), CourierError> {
        let text = to_json(&format!("pinned items of group {}", group.0), items)?;
        self.sql()
            .execute(
                "INSERT INTO pinned_items (group_id, items) VALUES (?1, ?2)
                 ON CONFLICT(group_id) DO UPDATE SET items = excluded.items",
                params![group.0, text],
            )
            .map_err(storage_err)?;
        Ok(())
    }
}
