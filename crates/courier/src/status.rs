// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status` and `courier pending`.

use std::collections::BTreeMap;

use courier_config::model::CourierConfig;
use courier_core::{CourierError, OperationLogEntry, OperationTag};
use courier_storage::Database;
use courier_sync::AUTOREMOVE_SCHEDULE_TAG;
use serde::Serialize;

/// Snapshot of a store.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub pending_operations: BTreeMap<String, usize>,
    pub unread_conversations: usize,
    pub scheduled_deletions: usize,
    /// Earliest scheduled self-destruct, unix seconds.
    pub next_deletion_at: Option<i32>,
    /// jemalloc heap usage of this process, when available.
    pub heap_allocated_bytes: Option<usize>,
}

/// Current jemalloc heap size.
fn heap_allocated_bytes() -> Option<usize> {
    #[cfg(not(target_env = "msvc"))]
    {
        tikv_jemalloc_ctl::epoch::advance().ok()?;
        tikv_jemalloc_ctl::stats::allocated::read().ok()
    }

    #[cfg(target_env = "msvc")]
    {
        None
    }
}

pub async fn collect_status(db: &Database) -> Result<StatusReport, CourierError> {
    let mut report = db.transaction(|txn| {
        let mut pending_operations = BTreeMap::new();
        for tag in OperationTag::ALL {
            pending_operations.insert(tag.to_string(), txn.operation_log_count(tag)?);
        }
        let schedule = txn.timestamp_based_attributes(AUTOREMOVE_SCHEDULE_TAG)?;
        Ok(StatusReport {
            pending_operations,
            unread_conversations: txn.unread_peer_ids()?.len(),
            scheduled_deletions: schedule.len(),
            next_deletion_at: schedule.first().map(|entry| entry.fire_at),
            heap_allocated_bytes: None,
        })
    })
    .await?;
    report.heap_allocated_bytes = heap_allocated_bytes();
    Ok(report)
}

fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str("pending operations:\n");
    for (tag, count) in &report.pending_operations {
        out.push_str(&format!("  {tag:<34} {count}\n"));
    }
    out.push_str(&format!("unread conversations: {}\n", report.unread_conversations));
    out.push_str(&format!("scheduled deletions:  {}", report.scheduled_deletions));
    if let Some(at) = report.next_deletion_at {
        out.push_str(&format!(" (next at {at})"));
    }
    if let Some(bytes) = report.heap_allocated_bytes {
        let mb = bytes as f64 / (1024.0 * 1024.0);
        out.push_str(&format!("\nheap:                 {mb:.1} MB"));
    }
    out
}

pub async fn run_status(config: &CourierConfig, json: bool) -> Result<(), CourierError> {
    let db = Database::open_with_config(&config.storage).await?;
    let report = collect_status(&db).await?;
    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| CourierError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{text}");
    } else {
        println!("{}", render(&report));
    }
    db.close().await
}

#[derive(Debug, Serialize)]
struct PendingLine {
    peer: String,
    tag_local_index: i32,
    merged_index: Option<i64>,
    contents: serde_json::Value,
}

fn pending_line(entry: &OperationLogEntry) -> PendingLine {
    let contents = serde_json::from_slice(&entry.contents).unwrap_or_else(|_| {
        serde_json::Value::String(format!("<{} undecodable bytes>", entry.contents.len()))
    });
    PendingLine {
        peer: entry.peer.to_string(),
        tag_local_index: entry.tag_local_index,
        merged_index: entry.merged_index,
        contents,
    }
}

/// Print the pending entries of `tag` as JSON lines, peer by peer.
pub async fn run_pending(config: &CourierConfig, tag: OperationTag) -> Result<(), CourierError> {
    let db = Database::open_with_config(&config.storage).await?;
    let entries = db
        .transaction(move |txn| {
            let mut entries = Vec::new();
            for peer in txn.operation_log_peers_with_entries(tag)? {
                entries.extend(txn.operation_log_entries(peer, tag)?);
            }
            Ok(entries)
        })
        .await?;

    for entry in &entries {
        let line = serde_json::to_string(&pending_line(entry))
            .map_err(|e| CourierError::Internal(format!("failed to serialize entry: {e}")))?;
        println!("{line}");
    }
    db.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{
        ConversationId, MergedIndex, MessageNamespace, PeerNamespace, StorageIndex,
    };
    use courier_test_utils::{MessageBuilder, TestHarness};

    #[tokio::test]
    async fn status_counts_pending_and_scheduled() {
        let harness = TestHarness::new().await.unwrap();
        let peer = ConversationId::new(PeerNamespace::CloudUser, 3);
        let message = MessageBuilder::new(peer, MessageNamespace::Cloud, 1)
            .incoming()
            .build();
        let id = message.id;
        harness.store_messages(vec![message]).await.unwrap();
        harness
            .db
            .transaction(move |txn| {
                txn.operation_log_add_entry(
                    peer,
                    OperationTag::SynchronizeReadState,
                    StorageIndex::Automatic,
                    MergedIndex::Automatic,
                    b"{}".to_vec(),
                )?;
                txn.add_timestamp_based_attribute(AUTOREMOVE_SCHEDULE_TAG, 500, id)
            })
            .await
            .unwrap();

        let report = collect_status(&harness.db).await.unwrap();
        assert_eq!(report.pending_operations["synchronize_read_state"], 1);
        assert_eq!(report.pending_operations["secret_outgoing"], 0);
        assert_eq!(report.unread_conversations, 1);
        assert_eq!(report.scheduled_deletions, 1);
        assert_eq!(report.next_deletion_at, Some(500));
        assert!(render(&report).contains("(next at 500)"));
        if cfg!(not(target_env = "msvc")) {
            assert!(report.heap_allocated_bytes.is_some_and(|bytes| bytes > 0));
        }
    }

    #[test]
    fn undecodable_contents_are_summarized() {
        let entry = OperationLogEntry {
            peer: ConversationId::global(0),
            tag: OperationTag::SynchronizePinnedChats,
            tag_local_index: 0,
            merged_index: Some(1),
            contents: vec![0xff, 0x00],
        };
        let line = pending_line(&entry);
        assert_eq!(line.contents, serde_json::json!("<2 undecodable bytes>"));
        assert_eq!(line.peer, "global:0");
    }
}
