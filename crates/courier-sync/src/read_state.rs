// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read cursors and the self-destruct countdowns they start.
//!
//! A self-destructing message starts its countdown the first time it becomes
//! read. Starting a countdown writes the begin time into the message and a
//! schedule entry at `begin + timeout`; both are written once and never moved.

use courier_core::{
    Clock, ConversationId, CourierError, MessageAttribute, MessageFlags, MessageId,
    MessageIndex, MessageNamespace,
};
use courier_storage::Transaction;
use tracing::{debug, trace};

use crate::synchronize::add_synchronize_read_state_operation;

/// Schedule tag of self-destruct deletions.
pub const AUTOREMOVE_SCHEDULE_TAG: u16 = 0;

/// Advance the local user's read cursor and apply its side effects.
///
/// Secret sessions start countdowns on the newly read messages. Cloud
/// conversations queue the new cursor for the server. Returns the messages
/// that became read.
pub fn apply_max_read_index_interactively(
    txn: &Transaction<'_>,
    clock: &dyn Clock,
    index: MessageIndex,
) -> Result<Vec<MessageId>, CourierError> {
    let peer = index.id.peer;
    let namespace = index.id.namespace;
    let before = txn.get_read_state(peer, namespace)?;
    let affected = txn.apply_interactive_read_max_index(index)?;

    if peer.is_secret_chat() {
        let now = clock.now();
        let mut started = 0;
        for id in &affected {
            if begin_countdown(txn, *id, now)? {
                started += 1;
            }
        }
        if started > 0 {
            debug!(%peer, started, "self-destruct countdowns started");
        }
    } else if peer.namespace.is_cloud() && index.id.id > before.max_incoming_read_id {
        add_synchronize_read_state_operation(txn, peer, namespace, index.id.id)?;
    }
    Ok(affected)
}

/// The remote side read our messages up to `index`.
///
/// In secret sessions, delivered outgoing messages in the newly read range
/// start their countdowns at `begin_countdown_at`.
pub fn apply_outgoing_read_max_index(
    txn: &Transaction<'_>,
    index: MessageIndex,
    begin_countdown_at: i32,
) -> Result<Vec<MessageId>, CourierError> {
    let affected = txn.apply_outgoing_read_max_index(index)?;
    if index.id.peer.is_secret_chat() {
        let pending = MessageFlags::UNDELIVERED;
        for id in &affected {
            let Some(message) = txn.get_message(*id)? else {
                continue;
            };
            if message.flags.intersects(pending) {
                continue;
            }
            begin_countdown(txn, *id, begin_countdown_at)?;
        }
    }
    Ok(affected)
}

/// A secret outgoing message finished sending after the peer's read cursor
/// already passed it. Starts its countdown at the message's own timestamp.
pub fn maybe_read_secret_outgoing_message(
    txn: &Transaction<'_>,
    index: MessageIndex,
) -> Result<bool, CourierError> {
    if !index.id.peer.is_secret_chat() || index.id.namespace != MessageNamespace::Local {
        return Ok(false);
    }
    if !txn.is_outgoing_message_index_read(index)? {
        return Ok(false);
    }
    begin_countdown(txn, index.id, index.timestamp)
}

/// Start the countdown of one message if it has a timer that has not started.
fn begin_countdown(
    txn: &Transaction<'_>,
    id: MessageId,
    begin: i32,
) -> Result<bool, CourierError> {
    let Some(message) = txn.get_message(id)? else {
        return Ok(false);
    };
    let Some((timeout, countdown_begin_time)) = message.autoremove_timeout() else {
        return Ok(false);
    };
    if countdown_begin_time.is_some_and(|t| t != 0) || message.contains_secret_media {
        return Ok(false);
    }

    txn.update_message(id, |message| {
        for attribute in &mut message.attributes {
            if let MessageAttribute::AutoremoveTimeout {
                countdown_begin_time,
                ..
            } = attribute
            {
                *countdown_begin_time = Some(begin);
                break;
            }
        }
    })?;
    let fire_at = begin.saturating_add(timeout);
    txn.add_timestamp_based_attribute(AUTOREMOVE_SCHEDULE_TAG, fire_at, id)?;
    trace!(message_id = ?id, begin, fire_at, "countdown started");
    Ok(true)
}

/// Flip or set the manual unread state of a conversation.
///
/// With `set_to` of `None` the state toggles. Marking read advances the read
/// cursor to the top message, so countdowns and sync operations follow.
/// Returns whether anything changed.
pub fn toggle_peer_unread_mark_interactively(
    txn: &Transaction<'_>,
    clock: &dyn Clock,
    peer: ConversationId,
    set_to: Option<bool>,
) -> Result<bool, CourierError> {
    let namespace = peer.primary_read_namespace();
    let unread = txn.is_peer_unread(peer, namespace)?;

    if unread && set_to != Some(true) {
        match txn.top_message_index(peer, namespace)? {
            Some(top) => {
                let state_before = txn.get_read_state(peer, namespace)?;
                apply_max_read_index_interactively(txn, clock, top)?;
                Ok(txn.get_read_state(peer, namespace)? != state_before)
            }
            None => txn.apply_mark_unread(peer, namespace, false),
        }
    } else if !unread && set_to != Some(false) {
        txn.apply_mark_unread(peer, namespace, true)
    } else {
        Ok(false)
    }
}

/// Mark every unread conversation as read. Returns how many changed.
pub fn mark_all_chats_as_read_interactively(
    txn: &Transaction<'_>,
    clock: &dyn Clock,
) -> Result<usize, CourierError> {
    let mut changed = 0;
    for peer in txn.unread_peer_ids()? {
        if toggle_peer_unread_mark_interactively(txn, clock, peer, Some(false))? {
            changed += 1;
        }
    }
    debug!(changed, "marked all chats as read");
    Ok(changed)
}
