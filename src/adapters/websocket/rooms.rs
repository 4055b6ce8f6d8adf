//! Conversation rooms for message routing.
//!
//! Rooms are keyed by conversation id and hold the outbound handles of
//! every subscribed connection, so a broadcast reaches all devices of both
//! participants without per-message recipient lookup.
//!
//! ```text
//! Room: conv-123         Room: conv-456
//! ├── conn-a (renter)    ├── conn-a (renter)
//! ├── conn-b (renter)    └── conn-d (landlord 2)
//! └── conn-c (landlord)
//! ```

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::foundation::ConversationId;

use super::connection::{ConnectionHandle, ConnectionId};
use super::messages::ServerEvent;

#[derive(Default)]
struct RoomState {
    /// conversation_id → subscribed connections.
    rooms: HashMap<ConversationId, HashMap<ConnectionId, ConnectionHandle>>,

    /// connection_id → joined rooms, for cleanup on disconnect without a scan.
    connection_rooms: HashMap<ConnectionId, HashSet<ConversationId>>,
}

impl RoomState {
    fn join(&mut self, handle: &ConnectionHandle, conversation_id: ConversationId) -> bool {
        let newly_joined = self
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(handle.id(), handle.clone())
            .is_none();
        self.connection_rooms
            .entry(handle.id())
            .or_default()
            .insert(conversation_id);
        newly_joined
    }

    fn remove_member(&mut self, connection_id: &ConnectionId, conversation_id: &ConversationId) {
        if let Some(members) = self.rooms.get_mut(conversation_id) {
            members.remove(connection_id);
            if members.is_empty() {
                self.rooms.remove(conversation_id);
            }
        }
    }
}

/// Subscription table of connections to conversation rooms.
///
/// Joins and leaves are idempotent; empty rooms are dropped.
#[derive(Default)]
pub struct RoomMembership {
    state: RwLock<RoomState>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a connection to a conversation room.
    ///
    /// Returns false if it was already subscribed.
    pub async fn join_conversation(
        &self,
        handle: &ConnectionHandle,
        conversation_id: ConversationId,
    ) -> bool {
        self.state.write().await.join(handle, conversation_id)
    }

    /// Subscribes a connection to every listed room in one step.
    ///
    /// Returns how many rooms were newly joined.
    pub async fn join_all(
        &self,
        handle: &ConnectionHandle,
        conversation_ids: impl IntoIterator<Item = ConversationId>,
    ) -> usize {
        let mut state = self.state.write().await;
        conversation_ids
            .into_iter()
            .filter(|id| state.join(handle, *id))
            .count()
    }

    /// Unsubscribes a connection from one room.
    pub async fn leave_conversation(
        &self,
        connection_id: &ConnectionId,
        conversation_id: ConversationId,
    ) {
        let mut state = self.state.write().await;
        state.remove_member(connection_id, &conversation_id);

        if let Some(joined) = state.connection_rooms.get_mut(connection_id) {
            joined.remove(&conversation_id);
            if joined.is_empty() {
                state.connection_rooms.remove(connection_id);
            }
        }
    }

    /// Unsubscribes a connection from every room it joined.
    ///
    /// Returns the rooms it left.
    pub async fn leave_all(&self, connection_id: &ConnectionId) -> Vec<ConversationId> {
        let mut state = self.state.write().await;
        let Some(joined) = state.connection_rooms.remove(connection_id) else {
            return Vec::new();
        };

        for conversation_id in &joined {
            state.remove_member(connection_id, conversation_id);
        }
        joined.into_iter().collect()
    }

    /// Delivers an event to every connection in the room, sender included.
    ///
    /// Returns how many connections accepted it. Full or closed queues are
    /// skipped.
    pub async fn broadcast_to_conversation(
        &self,
        conversation_id: ConversationId,
        event: &ServerEvent,
    ) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(&conversation_id) else {
            return 0;
        };

        let mut delivered = 0;
        for handle in members.values() {
            match handle.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    connection_id = %handle.id(),
                    conversation_id = %conversation_id,
                    error = %e,
                    "Dropped room event"
                ),
            }
        }
        delivered
    }

    /// Connections subscribed to a room.
    pub async fn members(&self, conversation_id: ConversationId) -> HashSet<ConnectionId> {
        self.state
            .read()
            .await
            .rooms
            .get(&conversation_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(
        &self,
        connection_id: &ConnectionId,
        conversation_id: ConversationId,
    ) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(&conversation_id)
            .is_some_and(|members| members.contains_key(connection_id))
    }

    /// Rooms a connection is subscribed to.
    #[cfg(test)]
    pub async fn rooms_of(&self, connection_id: &ConnectionId) -> HashSet<ConversationId> {
        self.state
            .read()
            .await
            .connection_rooms
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rooms with at least one subscriber.
    pub async fn active_rooms(&self) -> Vec<ConversationId> {
        self.state.read().await.rooms.keys().copied().collect()
    }
}
