// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic deletion of messages whose self-destruct timer has expired.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::SelfDestructConfig;
use courier_core::{Clock, CourierError, MessageId};
use courier_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::read_state::AUTOREMOVE_SCHEDULE_TAG;

/// Deletes due messages. Entries are only taken at or after their fire time,
/// and taking one removes it, so a message is deleted at most once.
pub struct SelfDestructSweeper {
    db: Database,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl SelfDestructSweeper {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: &SelfDestructConfig) -> Self {
        Self {
            db,
            clock,
            interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Sweep at the clock's current time.
    pub async fn sweep(&self) -> Result<Vec<MessageId>, CourierError> {
        self.sweep_at(self.clock.now()).await
    }

    /// Delete every message scheduled at or before `now`, in one transaction.
    pub async fn sweep_at(&self, now: i32) -> Result<Vec<MessageId>, CourierError> {
        let deleted = self
            .db
            .transaction(move |txn| {
                let due = txn.due_timestamp_based_attributes(AUTOREMOVE_SCHEDULE_TAG, now)?;
                let ids: Vec<MessageId> = due.iter().map(|entry| entry.message_id).collect();
                for id in &ids {
                    txn.remove_timestamp_based_attribute(AUTOREMOVE_SCHEDULE_TAG, *id)?;
                }
                txn.delete_messages(&ids)?;
                Ok(ids)
            })
            .await?;

        if !deleted.is_empty() {
            info!(count = deleted.len(), now, "self-destructed messages deleted");
        }
        Ok(deleted)
    }

    /// Sweep on every interval tick until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "self-destruct sweep failed (will retry)");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("self-destruct sweeper stopping");
                    break;
                }
            }
        }
    }
}
