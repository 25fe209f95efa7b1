// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock operation delivery for dispatcher tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CourierError, OperationDelivery, OperationLogEntry};

/// Acknowledges every delivery unless told to fail the next N attempts.
///
/// Every attempt, successful or not, is recorded in order.
#[derive(Clone, Default)]
pub struct MockDelivery {
    attempts: Arc<Mutex<Vec<OperationLogEntry>>>,
    delivered: Arc<Mutex<Vec<OperationLogEntry>>>,
    failures_remaining: Arc<Mutex<usize>>,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` delivery attempts with a remote error.
    pub async fn fail_next(&self, count: usize) {
        *self.failures_remaining.lock().await = count;
    }

    /// Entries acknowledged so far, in delivery order.
    pub async fn delivered(&self) -> Vec<OperationLogEntry> {
        self.delivered.lock().await.clone()
    }

    /// Number of delivery attempts, including failed ones.
    pub async fn attempt_count(&self) -> usize {
        self.attempts.lock().await.len()
    }
}

#[async_trait]
impl OperationDelivery for MockDelivery {
    async fn deliver(&self, entry: &OperationLogEntry) -> Result<(), CourierError> {
        self.attempts.lock().await.push(entry.clone());

        let mut failures = self.failures_remaining.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(CourierError::Remote {
                message: format!("mock delivery failure for {}", entry.peer),
                source: None,
            });
        }
        drop(failures);

        self.delivered.lock().await.push(entry.clone());
        Ok(())
    }
}
