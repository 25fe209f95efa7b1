// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end store tests.
//!
//! `TestHarness` opens a migrated SQLite database in a temp directory and
//! pairs it with a [`ManualClock`]. `MessageBuilder` keeps message fixtures
//! short.

use courier_config::model::StorageConfig;
use courier_core::{
    ConversationId, CourierError, Message, MessageAttribute, MessageFlags, MessageId,
    MessageNamespace,
};
use courier_storage::Database;
use tempfile::TempDir;

use crate::clock::ManualClock;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    start_time: i32,
    wal_mode: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            start_time: 1_000,
            wal_mode: true,
        }
    }

    /// Initial reading of the harness clock.
    pub fn with_start_time(mut self, now: i32) -> Self {
        self.start_time = now;
        self
    }

    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let temp_dir = TempDir::new().map_err(CourierError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: self.wal_mode,
            ..StorageConfig::default()
        };
        let db = Database::open_with_config(&config).await?;
        Ok(TestHarness {
            db,
            clock: ManualClock::new(self.start_time),
            _temp_dir: temp_dir,
        })
    }
}

/// A migrated temp database and a manual clock.
///
/// The temp directory is removed when the harness is dropped.
pub struct TestHarness {
    pub db: Database,
    pub clock: ManualClock,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, CourierError> {
        Self::builder().build().await
    }

    /// Store messages in one transaction.
    pub async fn store_messages(&self, messages: Vec<Message>) -> Result<(), CourierError> {
        self.db
            .transaction(move |txn| {
                for message in &messages {
                    txn.store_message(message)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn message(&self, id: MessageId) -> Result<Option<Message>, CourierError> {
        self.db.transaction(move |txn| txn.get_message(id)).await
    }
}

/// Fluent constructor for message fixtures.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// An outgoing, sent, plain text message with no attributes.
    pub fn new(peer: ConversationId, namespace: MessageNamespace, id: i32) -> Self {
        Self {
            message: Message {
                id: MessageId::new(peer, namespace, id),
                globally_unique_id: None,
                timestamp: 0,
                flags: MessageFlags::empty(),
                text: format!("message {id}"),
                attributes: Vec::new(),
                contains_secret_media: false,
            },
        }
    }

    pub fn incoming(mut self) -> Self {
        self.message.flags = self.message.flags | MessageFlags::INCOMING;
        self
    }

    pub fn flags(mut self, flags: MessageFlags) -> Self {
        self.message.flags = self.message.flags | flags;
        self
    }

    pub fn timestamp(mut self, timestamp: i32) -> Self {
        self.message.timestamp = timestamp;
        self
    }

    pub fn globally_unique_id(mut self, id: i64) -> Self {
        self.message.globally_unique_id = Some(id);
        self
    }

    /// Attach a self-destruct timer that has not started counting down.
    pub fn autoremove(mut self, timeout: i32) -> Self {
        self.message.attributes.push(MessageAttribute::AutoremoveTimeout {
            timeout,
            countdown_begin_time: None,
        });
        self
    }

    pub fn secret_media(mut self) -> Self {
        self.message.contains_secret_media = true;
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use courier_core::PeerNamespace;

    use super::*;

    #[tokio::test]
    async fn harness_round_trips_messages() {
        let harness = TestHarness::builder().with_start_time(42).build().await.unwrap();
        let peer = ConversationId::new(PeerNamespace::SecretChat, 1);
        let message = MessageBuilder::new(peer, MessageNamespace::SecretIncoming, 7)
            .incoming()
            .timestamp(40)
            .autoremove(30)
            .build();

        harness.store_messages(vec![message.clone()]).await.unwrap();
        assert_eq!(harness.message(message.id).await.unwrap(), Some(message));
        assert_eq!(courier_core::Clock::now(&harness.clock), 42);
    }
}
