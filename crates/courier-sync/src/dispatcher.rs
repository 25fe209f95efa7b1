// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drains one operation log tag into an [`OperationDelivery`].
//!
//! Delivery is at-least-once: an entry is removed only after the delivery
//! acknowledged it, so a crash in between redelivers it. Within a (peer, tag)
//! entries go out strictly in local index order; a failure holds back the
//! rest of that peer until its backoff expires.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use courier_config::model::DispatcherConfig;
use courier_core::{ConversationId, CourierError, OperationDelivery, OperationTag};
use courier_storage::Database;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exponential retry delay: `initial`, doubled per failure, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before the next attempt after one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(current) => current.saturating_mul(2).min(self.max),
        };
        self.current = Some(next);
        next
    }
}

/// Outcome of one drain round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    /// Peers skipped because their backoff has not expired.
    pub deferred: usize,
}

struct Retry {
    backoff: Backoff,
    not_before: Instant,
}

pub struct OperationDispatcher<D: OperationDelivery> {
    db: Database,
    delivery: Arc<D>,
    tag: OperationTag,
    config: DispatcherConfig,
    retries: BTreeMap<ConversationId, Retry>,
}

impl<D: OperationDelivery> OperationDispatcher<D> {
    pub fn new(db: Database, delivery: Arc<D>, tag: OperationTag, config: DispatcherConfig) -> Self {
        Self {
            db,
            delivery,
            tag,
            config,
            retries: BTreeMap::new(),
        }
    }

    pub fn tag(&self) -> OperationTag {
        self.tag
    }

    /// Deliver pending entries of every peer not in backoff.
    pub async fn drain_once(&mut self) -> Result<DrainReport, CourierError> {
        let tag = self.tag;
        let peers = self
            .db
            .transaction(move |txn| txn.operation_log_peers_with_entries(tag))
            .await?;

        let mut report = DrainReport::default();
        for peer in peers {
            if self
                .retries
                .get(&peer)
                .is_some_and(|retry| retry.not_before > Instant::now())
            {
                report.deferred += 1;
                continue;
            }
            self.drain_peer(peer, &mut report).await?;
        }

        if report.delivered > 0 || report.failed > 0 {
            info!(
                %tag,
                delivered = report.delivered,
                failed = report.failed,
                deferred = report.deferred,
                "operation log drained"
            );
        }
        Ok(report)
    }

    async fn drain_peer(
        &mut self,
        peer: ConversationId,
        report: &mut DrainReport,
    ) -> Result<(), CourierError> {
        let tag = self.tag;
        loop {
            let head = self
                .db
                .transaction(move |txn| txn.operation_log_first_entry(peer, tag))
                .await?;
            let Some(entry) = head else {
                self.retries.remove(&peer);
                return Ok(());
            };

            match self.delivery.deliver(&entry).await {
                Ok(()) => {
                    let local_index = entry.tag_local_index;
                    let removed = self
                        .db
                        .transaction(move |txn| txn.operation_log_remove_entry(peer, tag, local_index))
                        .await?;
                    if !removed {
                        debug!(%peer, %tag, local_index, "acknowledged entry already replaced");
                    }
                    self.retries.remove(&peer);
                    report.delivered += 1;
                }
                Err(e) => {
                    let config = &self.config;
                    let retry = self.retries.entry(peer).or_insert_with(|| Retry {
                        backoff: Backoff::from_config(config),
                        not_before: Instant::now(),
                    });
                    let delay = retry.backoff.next_delay();
                    retry.not_before = Instant::now() + delay;
                    warn!(
                        %peer,
                        %tag,
                        local_index = entry.tag_local_index,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation delivery failed"
                    );
                    report.failed += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Drain on every poll tick until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain_once().await {
                        warn!(tag = %self.tag, error = %e, "operation drain failed (will retry)");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(tag = %self.tag, "operation dispatcher stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(3000));
        let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 3000, 3000]);
    }

    #[test]
    fn backoff_max_below_initial_is_raised() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
