// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronization logic on top of the durable store.
//!
//! Everything here runs inside a [`courier_storage::Transaction`]: a local
//! change and the operation that tells the server about it commit together or
//! not at all. The dispatcher, the self-destruct sweeper and the reference
//! cache are the long-lived pieces that drive transactions on their own.

pub mod contents;
pub mod dispatcher;
pub mod messages;
pub mod read_state;
pub mod reference_cache;
pub mod secret_chat;
pub mod self_destruct;
pub mod synchronize;

pub use dispatcher::{Backoff, DrainReport, OperationDispatcher};
pub use messages::{
    add_secret_chat_message_screenshot, clear_history_interactively,
    delete_messages_interactively, set_secret_chat_message_autoremove_timeout_interactively,
};
pub use read_state::{
    apply_max_read_index_interactively, apply_outgoing_read_max_index,
    mark_all_chats_as_read_interactively, maybe_read_secret_outgoing_message,
    toggle_peer_unread_mark_interactively, AUTOREMOVE_SCHEDULE_TAG,
};
pub use reference_cache::{
    CollectionLookup, FoundItem, ReferenceCollections, SearchScope, CACHED_COLLECTIONS,
    CACHED_QUERY_RESULTS, QUERY_RESULTS_SPEC,
};
pub use secret_chat::{
    add_secret_chat_outgoing_operation, apply_session_event, can_send_messages_to_peer,
    secret_chat_state, DropReason, EnqueueOutcome, SecretChatEmbeddedState, SecretChatLayer,
    SecretChatRole, SecretChatState, SessionEvent,
};
pub use self_destruct::SelfDestructSweeper;
pub use synchronize::{
    add_collection_interactively, add_synchronize_installed_collections_operation,
    add_synchronize_pinned_chats_operation, add_synchronize_read_state_operation,
    remove_collection_interactively, set_pinned_chats_interactively, InstalledCollectionsChange,
    RemoveCollectionOption,
};
