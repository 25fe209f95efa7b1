// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network delivery of outgoing operation log entries.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::OperationLogEntry;

/// Sends one operation log entry to the server.
///
/// Returning `Ok(())` means the server durably acknowledged the operation;
/// the dispatcher then removes the entry. Delivery is at-least-once, so
/// implementations whose remote effect is not idempotent must derive an
/// idempotency key from the entry (the secret-session payloads carry one).
#[async_trait]
pub trait OperationDelivery: Send + Sync + 'static {
    async fn deliver(&self, entry: &OperationLogEntry) -> Result<(), CourierError>;
}
