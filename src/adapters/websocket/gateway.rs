//! RealtimeGateway - connection lifecycle and event dispatch.
//!
//! Owns the registry, presence, room and sequencing tables. Each
//! connection moves through `Connected → Registered(user) → Disconnected`.
//! Inbound events are validated against the registered identity, applied
//! through the `ConversationStore`, and fanned out either to a conversation
//! room or directly to a user's connections.
//!
//! In-memory tables are never locked across a persistence await.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::application::ConversationStore;
use crate::domain::chat::Conversation;
use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, UserId};
use crate::domain::notification::BookingNotification;
use crate::ports::NotificationSink;

use super::connection::{ConnectionHandle, ConnectionId, Namespace};
use super::messages::{
    Ack, ClientEvent, ClientFrame, ConnectedPayload, ConversationRef, OpenConversationPayload,
    SendMessagePayload, ServerEvent,
};
use super::presence::PresenceTracker;
use super::registry::ConnectionRegistry;
use super::rooms::RoomMembership;
use super::sequencer::ConversationSequencer;

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Clone)]
struct ConnectionState {
    handle: ConnectionHandle,
    namespace: Namespace,
    /// Identity proven by the upgrade credential.
    authenticated: Option<UserId>,
    /// Identity claimed by `register`.
    registered: Option<UserId>,
}

/// The realtime delivery layer.
pub struct RealtimeGateway {
    store: Arc<ConversationStore>,
    registry: ConnectionRegistry,
    presence: PresenceTracker,
    rooms: RoomMembership,
    sequencer: ConversationSequencer,
    connections: RwLock<HashMap<ConnectionId, ConnectionState>>,
    outbound_buffer: usize,
}

impl RealtimeGateway {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            presence: PresenceTracker::new(),
            rooms: RoomMembership::new(),
            sequencer: ConversationSequencer::new(),
            connections: RwLock::new(HashMap::new()),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════════

    /// Accepts a new connection.
    ///
    /// Returns its id and the receiver the socket writer drains. The first
    /// queued event is `connected`.
    pub async fn connect(
        &self,
        namespace: Namespace,
        authenticated: Option<UserId>,
    ) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (handle, receiver) = ConnectionHandle::channel(self.outbound_buffer);
        let connection_id = handle.id();

        let connected = ServerEvent::Connected(ConnectedPayload {
            connection_id: connection_id.to_string(),
            namespace: namespace.as_str().to_string(),
            user_id: authenticated.clone(),
        });
        if let Err(e) = handle.deliver(connected) {
            debug!(connection_id = %connection_id, error = %e, "Could not queue connected event");
        }

        self.connections.write().await.insert(
            connection_id,
            ConnectionState {
                handle,
                namespace,
                authenticated,
                registered: None,
            },
        );

        debug!(
            connection_id = %connection_id,
            namespace = namespace.as_str(),
            "Connection accepted"
        );
        (connection_id, receiver)
    }

    /// Tears down a connection.
    ///
    /// When this was the user's last connection, their typing flags are
    /// cleared and each affected room is told the new typing set.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.connections.write().await.remove(&connection_id);
        let unregistered = self.registry.unregister(&connection_id).await;
        let left = self.rooms.leave_all(&connection_id).await;

        let Some(unregistered) = unregistered else {
            debug!(connection_id = %connection_id, "Anonymous connection closed");
            return;
        };

        if unregistered.went_offline {
            for (conversation_id, typing_users) in
                self.presence.clear_user(&unregistered.user_id).await
            {
                self.rooms
                    .broadcast_to_conversation(
                        conversation_id,
                        &ServerEvent::typing_status(conversation_id, typing_users),
                    )
                    .await;
            }
        }

        let online_users = self.registry.online_user_count().await;
        info!(
            connection_id = %connection_id,
            user_id = %unregistered.user_id,
            went_offline = unregistered.went_offline,
            rooms_left = left.len(),
            online_users,
            "Connection closed"
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inbound dispatch
    // ════════════════════════════════════════════════════════════════════════════

    /// Parses and handles one text frame. Always answers with an `ack`.
    pub async fn dispatch_text(&self, connection_id: ConnectionId, text: &str) {
        match ClientFrame::parse(text) {
            Ok(frame) => self.dispatch(connection_id, frame).await,
            Err(err) => {
                debug!(connection_id = %connection_id, error = %err.message, "Rejected frame");
                let ack_id = err.ack_id.clone();
                let ack = Ack::error(ack_id, &err.into());
                self.send_to_connection(connection_id, ServerEvent::Ack(ack))
                    .await;
            }
        }
    }

    /// Handles one client event and acknowledges it to the sender.
    ///
    /// Errors never close the connection; they only produce an error ack.
    pub async fn dispatch(&self, connection_id: ConnectionId, frame: ClientFrame) {
        let event_name = frame.event.name();

        let ack = match self.handle_event(connection_id, frame.event).await {
            Ok(data) => Ack::ok(frame.ack_id, data),
            Err(e) => {
                if e.is_client_error() {
                    debug!(
                        connection_id = %connection_id,
                        event = event_name,
                        code = %e.code,
                        "Event rejected: {}",
                        e.message
                    );
                } else {
                    warn!(
                        connection_id = %connection_id,
                        event = event_name,
                        code = %e.code,
                        "Event failed: {}",
                        e.message
                    );
                }
                Ack::error(frame.ack_id, &e)
            }
        };

        self.send_to_connection(connection_id, ServerEvent::Ack(ack))
            .await;
    }

    async fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<Option<Value>, DomainError> {
        let state = self.state_of(connection_id).await?;

        match event {
            ClientEvent::Ping => {
                self.send_to_connection(connection_id, ServerEvent::pong())
                    .await;
                Ok(None)
            }
            ClientEvent::Register(payload) => self.register(state, payload.user_id).await,
            other => {
                if state.namespace != Namespace::Chat {
                    return Err(DomainError::forbidden(format!(
                        "'{}' is not available on the {} namespace",
                        other.name(),
                        state.namespace.as_str()
                    )));
                }
                let user = state.registered.clone().ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::NotRegistered,
                        "Connection must register before sending events",
                    )
                })?;

                match other {
                    ClientEvent::JoinConversation(r) => self.join(&state, &user, r).await,
                    ClientEvent::LeaveConversation(r) => self.leave(&state, &user, r).await,
                    ClientEvent::OpenConversation(p) => self.open(&user, p).await,
                    ClientEvent::SendMessage(p) => self.send_message(&user, p).await,
                    ClientEvent::TypingStart(r) => self.typing(&state, &user, r, true).await,
                    ClientEvent::TypingStop(r) => self.typing(&state, &user, r, false).await,
                    ClientEvent::MarkRead(r) => self.mark_read(&user, r).await,
                    ClientEvent::Ping | ClientEvent::Register(_) => Ok(None),
                }
            }
        }
    }

    async fn register(
        &self,
        state: ConnectionState,
        user_id: UserId,
    ) -> Result<Option<Value>, DomainError> {
        let connection_id = state.handle.id();

        if let Some(authenticated) = &state.authenticated {
            if authenticated != &user_id {
                return Err(DomainError::forbidden(
                    "Cannot register as a different user than the authenticated one",
                ));
            }
        }
        match &state.registered {
            Some(existing) if existing != &user_id => {
                return Err(DomainError::forbidden(
                    "Connection is already registered to another user",
                ));
            }
            Some(_) => return Ok(Some(json!({ "userId": user_id }))),
            None => {}
        }

        {
            let mut connections = self.connections.write().await;
            match connections.get_mut(&connection_id) {
                Some(live) => live.registered = Some(user_id.clone()),
                None => return Err(closed_connection()),
            }
        }
        self.registry.register(&user_id, connection_id).await;

        let mut joined = 0;
        if state.namespace == Namespace::Chat {
            let conversation_ids: Vec<ConversationId> = self
                .store
                .conversations_for(&user_id)
                .await?
                .iter()
                .map(|summary| summary.conversation.id())
                .collect();

            joined = self
                .rooms
                .join_all(&state.handle, conversation_ids)
                .await;

            // The socket may have closed during the lookup.
            if !self.connections.read().await.contains_key(&connection_id) {
                self.disconnect(connection_id).await;
                return Err(closed_connection());
            }
        } else if !self.connections.read().await.contains_key(&connection_id) {
            self.disconnect(connection_id).await;
            return Err(closed_connection());
        }

        info!(
            connection_id = %connection_id,
            user_id = %user_id,
            namespace = state.namespace.as_str(),
            rooms = joined,
            "Connection registered"
        );
        Ok(Some(json!({ "userId": user_id, "conversations": joined })))
    }

    async fn join(
        &self,
        state: &ConnectionState,
        user: &UserId,
        target: ConversationRef,
    ) -> Result<Option<Value>, DomainError> {
        ensure_same_user(user, target.user_id.as_ref())?;
        self.store.get_by_id(target.conversation_id, user).await?;
        self.rooms
            .join_conversation(&state.handle, target.conversation_id)
            .await;
        Ok(None)
    }

    async fn leave(
        &self,
        state: &ConnectionState,
        user: &UserId,
        target: ConversationRef,
    ) -> Result<Option<Value>, DomainError> {
        ensure_same_user(user, target.user_id.as_ref())?;
        self.rooms
            .leave_conversation(&state.handle.id(), target.conversation_id)
            .await;
        Ok(None)
    }

    /// Finds or creates the conversation with another user and subscribes
    /// both users' live connections to its room.
    async fn open(
        &self,
        user: &UserId,
        payload: OpenConversationPayload,
    ) -> Result<Option<Value>, DomainError> {
        let conversation = self
            .store
            .get_or_create(user, &payload.other_user_id, payload.listing_id)
            .await?;
        self.attach_participants(&conversation).await;

        Ok(to_data(&conversation))
    }

    async fn send_message(
        &self,
        user: &UserId,
        payload: SendMessagePayload,
    ) -> Result<Option<Value>, DomainError> {
        ensure_same_user(user, payload.user_id.as_ref())?;
        let conversation_id = payload.conversation_id;

        let message = {
            let _turn = self.sequencer.lock(conversation_id).await;
            let message = self
                .store
                .append_message(
                    conversation_id,
                    user,
                    payload.content,
                    payload.image_url,
                    payload.listing_id,
                )
                .await?;
            self.rooms
                .broadcast_to_conversation(conversation_id, &ServerEvent::NewMessage(message.clone()))
                .await;
            message
        };

        if let Some(typing_users) = self.presence.stop_typing(conversation_id, user).await {
            self.rooms
                .broadcast_to_conversation(
                    conversation_id,
                    &ServerEvent::typing_status(conversation_id, typing_users),
                )
                .await;
        }

        Ok(to_data(&message))
    }

    /// Starting to type is only accepted from connections subscribed to the
    /// room, which every authorised join path guarantees. Stopping is always
    /// accepted so a user who left the room can still clear their flag.
    async fn typing(
        &self,
        state: &ConnectionState,
        user: &UserId,
        target: ConversationRef,
        started: bool,
    ) -> Result<Option<Value>, DomainError> {
        ensure_same_user(user, target.user_id.as_ref())?;
        let conversation_id = target.conversation_id;

        if started
            && !self
                .rooms
                .is_member(&state.handle.id(), conversation_id)
                .await
        {
            return Err(DomainError::forbidden(
                "Join the conversation before sending typing updates",
            ));
        }

        let changed = if started {
            self.presence.start_typing(conversation_id, user).await
        } else {
            self.presence.stop_typing(conversation_id, user).await
        };

        if let Some(typing_users) = changed {
            self.rooms
                .broadcast_to_conversation(
                    conversation_id,
                    &ServerEvent::typing_status(conversation_id, typing_users),
                )
                .await;
        }
        Ok(None)
    }

    async fn mark_read(
        &self,
        user: &UserId,
        target: ConversationRef,
    ) -> Result<Option<Value>, DomainError> {
        ensure_same_user(user, target.user_id.as_ref())?;

        let receipt = self.store.mark_read(target.conversation_id, user).await?;
        self.rooms
            .broadcast_to_conversation(
                target.conversation_id,
                &ServerEvent::MessageRead(receipt.clone()),
            )
            .await;

        Ok(to_data(&receipt))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Outbound entry points
    // ════════════════════════════════════════════════════════════════════════════

    /// Delivers an event to every registered connection of a user, on any
    /// namespace, bypassing rooms.
    ///
    /// Returns how many connections accepted it; zero when offline.
    pub async fn send_notification_to_user(&self, user_id: &UserId, event: ServerEvent) -> usize {
        let connection_ids = self.registry.connections_for(user_id).await;
        if connection_ids.is_empty() {
            debug!(user_id = %user_id, event = event.name(), "User offline, live delivery skipped");
            return 0;
        }

        let connections = self.connections.read().await;
        let mut delivered = 0;
        for connection_id in connection_ids {
            let Some(state) = connections.get(&connection_id) else {
                continue;
            };
            match state.handle.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    connection_id = %connection_id,
                    user_id = %user_id,
                    error = %e,
                    "Dropped user event"
                ),
            }
        }
        delivered
    }

    /// Subscribes every live chat connection of both participants to the
    /// conversation's room.
    ///
    /// Used when a conversation is created after its participants
    /// registered. Returns how many connections were newly subscribed.
    pub async fn attach_participants(&self, conversation: &Conversation) -> usize {
        let mut attached = 0;
        for member in conversation.pair().members() {
            for connection_id in self.registry.connections_for(member).await {
                if let Some(handle) = self.chat_handle(connection_id).await {
                    if self.rooms.join_conversation(&handle, conversation.id()).await {
                        attached += 1;
                    }
                }
            }
        }
        attached
    }

    /// Delivers an event to every connection subscribed to a conversation.
    pub async fn broadcast_to_conversation(
        &self,
        conversation_id: ConversationId,
        event: ServerEvent,
    ) -> usize {
        self.rooms
            .broadcast_to_conversation(conversation_id, &event)
            .await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn state_of(&self, connection_id: ConnectionId) -> Result<ConnectionState, DomainError> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .cloned()
            .ok_or_else(closed_connection)
    }

    async fn chat_handle(&self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .filter(|state| state.namespace == Namespace::Chat)
            .map(|state| state.handle.clone())
    }

    async fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) {
        let handle = self
            .connections
            .read()
            .await
            .get(&connection_id)
            .map(|state| state.handle.clone());

        if let Some(handle) = handle {
            if let Err(e) = handle.deliver(event) {
                debug!(connection_id = %connection_id, error = %e, "Dropped direct event");
            }
        }
    }
}

#[async_trait]
impl NotificationSink for RealtimeGateway {
    async fn deliver(&self, notification: &BookingNotification) -> usize {
        self.send_notification_to_user(&notification.recipient, ServerEvent::booking(notification))
            .await
    }
}

fn ensure_same_user(registered: &UserId, claimed: Option<&UserId>) -> Result<(), DomainError> {
    match claimed {
        Some(claimed) if claimed != registered => Err(DomainError::forbidden(
            "userId does not match the registered user",
        )),
        _ => Ok(()),
    }
}

fn closed_connection() -> DomainError {
    DomainError::internal("Connection is no longer open")
}

fn to_data<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}
