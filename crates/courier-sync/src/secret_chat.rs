// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation secret session state machine.
//!
//! States: Handshake -> BasicLayer | Terminated, BasicLayer ->
//! SequenceBasedLayer, SequenceBasedLayer -> SequenceBasedLayer on
//! renegotiation, and any state -> Terminated. Session-scoped operations are
//! only enqueued while a layer is active, and the layer is resolved in the
//! same transaction as the enqueue.

use courier_core::{
    ConversationId, CourierError, MergedIndex, OperationLogEntry, OperationTag, StorageIndex,
};
use courier_storage::Transaction;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::contents::{encode, SecretChatOutgoingOperation};

/// Negotiated protocol layer of a secret session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SecretChatLayer {
    /// Implicit layer of a session that never upgraded.
    Layer8,
    Layer46,
    Layer73,
    Layer101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretChatRole {
    Creator,
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    /// We sent the request and wait for the remote side to accept.
    Requested,
    /// The remote side requested and we are accepting.
    Accepting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerNegotiationState {
    pub active_layer: SecretChatLayer,
    pub locally_requested_layer: Option<SecretChatLayer>,
    pub remotely_requested_layer: Option<SecretChatLayer>,
}

/// Sequence counters of a sequence-based session. Neither ever decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceInfo {
    /// Number of outgoing operations enqueued since the upgrade, not counting
    /// pending entries that a later operation replaced before delivery.
    pub outgoing_operation_count: i32,
    /// Local index of the newest enqueued outgoing operation.
    pub last_outgoing_local_index: Option<i32>,
    /// Highest remote sequence number processed.
    pub top_processed_incoming_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceBasedState {
    pub layer_negotiation: LayerNegotiationState,
    pub sequence: SequenceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum SecretChatEmbeddedState {
    Handshake(HandshakeState),
    Terminated,
    BasicLayer,
    SequenceBasedLayer(SequenceBasedState),
}

impl SecretChatEmbeddedState {
    pub fn name(&self) -> &'static str {
        match self {
            SecretChatEmbeddedState::Handshake(_) => "handshake",
            SecretChatEmbeddedState::Terminated => "terminated",
            SecretChatEmbeddedState::BasicLayer => "basic_layer",
            SecretChatEmbeddedState::SequenceBasedLayer(_) => "sequence_based_layer",
        }
    }
}

/// Protocol events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    HandshakeCompleted { key_fingerprint: i64 },
    HandshakeRejected,
    LayerUpgradeAcknowledged { layer: SecretChatLayer },
    LayerRenegotiated {
        layer: SecretChatLayer,
        top_processed_incoming_index: i32,
    },
    Terminate,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::HandshakeCompleted { .. } => "handshake_completed",
            SessionEvent::HandshakeRejected => "handshake_rejected",
            SessionEvent::LayerUpgradeAcknowledged { .. } => "layer_upgrade_acknowledged",
            SessionEvent::LayerRenegotiated { .. } => "layer_renegotiated",
            SessionEvent::Terminate => "terminate",
        }
    }
}

/// Persisted state of one secret session. Replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretChatState {
    pub role: SecretChatRole,
    pub embedded_state: SecretChatEmbeddedState,
    /// Opaque fingerprint of the negotiated key.
    pub key_fingerprint: Option<i64>,
    pub message_autoremove_timeout: Option<i32>,
}

impl SecretChatState {
    /// A new session waiting on its handshake.
    pub fn new(role: SecretChatRole) -> Self {
        let handshake = match role {
            SecretChatRole::Creator => HandshakeState::Requested,
            SecretChatRole::Participant => HandshakeState::Accepting,
        };
        Self {
            role,
            embedded_state: SecretChatEmbeddedState::Handshake(handshake),
            key_fingerprint: None,
            message_autoremove_timeout: None,
        }
    }

    /// The layer outgoing operations are encoded for, or `None` while no
    /// operation may be enqueued.
    pub fn active_layer(&self) -> Option<SecretChatLayer> {
        match &self.embedded_state {
            SecretChatEmbeddedState::Handshake(_) | SecretChatEmbeddedState::Terminated => None,
            SecretChatEmbeddedState::BasicLayer => Some(SecretChatLayer::Layer8),
            SecretChatEmbeddedState::SequenceBasedLayer(state) => {
                Some(state.layer_negotiation.active_layer)
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.embedded_state == SecretChatEmbeddedState::Terminated
    }

    pub fn with_message_autoremove_timeout(&self, timeout: Option<i32>) -> Self {
        Self {
            message_autoremove_timeout: timeout,
            ..self.clone()
        }
    }

    /// The state after `event`, or [`CourierError::InvalidTransition`] when
    /// the event is not legal in the current state.
    pub fn apply(&self, event: SessionEvent) -> Result<SecretChatState, CourierError> {
        use SecretChatEmbeddedState as S;

        let embedded_state = match (&self.embedded_state, event) {
            (_, SessionEvent::Terminate) => S::Terminated,
            (S::Handshake(_), SessionEvent::HandshakeCompleted { key_fingerprint }) => {
                return Ok(Self {
                    embedded_state: S::BasicLayer,
                    key_fingerprint: Some(key_fingerprint),
                    ..self.clone()
                });
            }
            (S::Handshake(_), SessionEvent::HandshakeRejected) => S::Terminated,
            (S::BasicLayer, SessionEvent::LayerUpgradeAcknowledged { layer })
                if layer > SecretChatLayer::Layer8 =>
            {
                S::SequenceBasedLayer(SequenceBasedState {
                    layer_negotiation: LayerNegotiationState {
                        active_layer: layer,
                        locally_requested_layer: Some(layer),
                        remotely_requested_layer: Some(layer),
                    },
                    sequence: SequenceInfo::default(),
                })
            }
            (
                S::SequenceBasedLayer(current),
                SessionEvent::LayerRenegotiated {
                    layer,
                    top_processed_incoming_index,
                },
            ) if layer > SecretChatLayer::Layer8 => S::SequenceBasedLayer(SequenceBasedState {
                layer_negotiation: LayerNegotiationState {
                    active_layer: layer,
                    remotely_requested_layer: Some(layer),
                    ..current.layer_negotiation
                },
                sequence: SequenceInfo {
                    top_processed_incoming_index: current
                        .sequence
                        .top_processed_incoming_index
                        .max(top_processed_incoming_index),
                    ..current.sequence
                },
            }),
            (state, event) => {
                return Err(CourierError::InvalidTransition {
                    from: state.name().to_string(),
                    event: event.name().to_string(),
                });
            }
        };

        Ok(Self {
            embedded_state,
            ..self.clone()
        })
    }

    /// Account for an enqueued outgoing operation that replaced `superseded`
    /// pending ones.
    fn with_outgoing_operation(&self, local_index: i32, superseded: i32) -> Self {
        match &self.embedded_state {
            SecretChatEmbeddedState::SequenceBasedLayer(current) => Self {
                embedded_state: SecretChatEmbeddedState::SequenceBasedLayer(SequenceBasedState {
                    sequence: SequenceInfo {
                        outgoing_operation_count: current
                            .sequence
                            .outgoing_operation_count
                            .saturating_add(1)
                            .saturating_sub(superseded)
                            .max(current.sequence.outgoing_operation_count),
                        last_outgoing_local_index: Some(local_index),
                        ..current.sequence
                    },
                    ..*current
                }),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }
}

/// Why a session-scoped operation was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    /// No session state exists for the conversation.
    NoSession,
    Handshake,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued(OperationLogEntry),
    /// Expected during teardown races; never an error.
    Dropped(DropReason),
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued(_))
    }
}

/// Read the session state of `peer`.
pub fn secret_chat_state(
    txn: &Transaction<'_>,
    peer: ConversationId,
) -> Result<Option<SecretChatState>, CourierError> {
    txn.get_peer_chat_state(peer)
}

/// Apply a protocol event to the stored session state and persist the result.
///
/// A missing session starts from a fresh handshake in the participant role.
pub fn apply_session_event(
    txn: &Transaction<'_>,
    peer: ConversationId,
    event: SessionEvent,
) -> Result<SecretChatState, CourierError> {
    let current = secret_chat_state(txn, peer)?
        .unwrap_or_else(|| SecretChatState::new(SecretChatRole::Participant));
    let updated = current.apply(event)?;
    if updated != current {
        txn.set_peer_chat_state(peer, &updated)?;
        debug!(
            %peer,
            from = current.embedded_state.name(),
            to = updated.embedded_state.name(),
            event = event.name(),
            "secret session transition"
        );
    }
    Ok(updated)
}

/// Enqueue a session-scoped operation if the session has an active layer.
///
/// `build` receives the active layer and produces the operation; it is only
/// called when the operation will be enqueued and may remove pending entries
/// of `peer` that the new operation replaces. The session's sequence info is
/// advanced and persisted in the same transaction.
pub fn add_secret_chat_outgoing_operation<F>(
    txn: &Transaction<'_>,
    peer: ConversationId,
    build: F,
) -> Result<EnqueueOutcome, CourierError>
where
    F: FnOnce(SecretChatLayer) -> Result<SecretChatOutgoingOperation, CourierError>,
{
    let Some(state) = secret_chat_state(txn, peer)? else {
        debug!(%peer, "dropping secret operation: no session");
        return Ok(EnqueueOutcome::Dropped(DropReason::NoSession));
    };

    let Some(layer) = state.active_layer() else {
        let reason = if state.is_terminated() {
            DropReason::Terminated
        } else {
            DropReason::Handshake
        };
        debug!(%peer, %reason, "dropping secret operation: no active layer");
        return Ok(EnqueueOutcome::Dropped(reason));
    };

    let pending_before = txn.operation_log_entries(peer, OperationTag::SecretOutgoing)?.len();
    let operation = build(layer)?;
    let pending_after = txn.operation_log_entries(peer, OperationTag::SecretOutgoing)?.len();
    let superseded = i32::try_from(pending_before.saturating_sub(pending_after)).unwrap_or(i32::MAX);
    let entry = txn.operation_log_add_entry(
        peer,
        OperationTag::SecretOutgoing,
        StorageIndex::Automatic,
        MergedIndex::None,
        encode(&operation)?,
    )?;

    let updated = state.with_outgoing_operation(entry.tag_local_index, superseded);
    if updated != state {
        txn.set_peer_chat_state(peer, &updated)?;
    }
    Ok(EnqueueOutcome::Enqueued(entry))
}

/// Whether new messages may be sent to `peer`.
///
/// Secret sessions need an active layer; account-wide scopes never accept
/// messages.
pub fn can_send_messages_to_peer(
    txn: &Transaction<'_>,
    peer: ConversationId,
) -> Result<bool, CourierError> {
    if peer.namespace.is_cloud() {
        return Ok(true);
    }
    if peer.is_secret_chat() {
        return Ok(secret_chat_state(txn, peer)?
            .and_then(|state| state.active_layer())
            .is_some());
    }
    Ok(false)
}
