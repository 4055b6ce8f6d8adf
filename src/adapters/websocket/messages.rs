//! WebSocket message protocol for chat and notifications.
//!
//! Every frame in either direction is a JSON object
//! `{"event": <name>, "data": <payload>}`. Client frames may carry an
//! `ackId`, echoed back on the `ack` the server sends for that frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::chat::{Message, ReadReceipt};
use crate::domain::foundation::{
    BookingId, ConversationId, DomainError, ErrorCode, ListingId, Timestamp, UserId,
};
use crate::domain::notification::{BookingEventKind, BookingNotification, ListingRef};

// ============================================
// Server → Client Messages
// ============================================

/// All events the server pushes to a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once when the socket is accepted.
    Connected(ConnectedPayload),

    /// Outcome of one client frame.
    Ack(Ack),

    /// Heartbeat response.
    Pong(PongPayload),

    NewMessage(Message),

    /// Full current set of typists; never a delta.
    TypingStatus(TypingStatusPayload),

    MessageRead(ReadReceipt),

    BookingCreated(BookingPayload),
    BookingAccepted(BookingPayload),
    BookingRejected(BookingPayload),
    BookingCancelled(BookingPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub connection_id: String,
    pub namespace: String,
    /// User resolved from the upgrade credential, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PongPayload {
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatusPayload {
    pub conversation_id: ConversationId,
    pub typing_users: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub booking_id: BookingId,
    pub listing: ListingRef,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Acknowledgement of a client frame, sent to the originating connection only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<Value>,
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Ack {
    pub fn ok(ack_id: Option<Value>, data: Option<Value>) -> Self {
        Self {
            ack_id,
            status: AckStatus::Ok,
            code: None,
            message: None,
            data,
        }
    }

    pub fn error(ack_id: Option<Value>, error: &DomainError) -> Self {
        Self {
            ack_id,
            status: AckStatus::Error,
            code: Some(error.code.to_string()),
            message: Some(error.message.clone()),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}

impl ServerEvent {
    pub fn pong() -> Self {
        ServerEvent::Pong(PongPayload {
            timestamp: Timestamp::now(),
        })
    }

    pub fn typing_status(conversation_id: ConversationId, typing_users: Vec<UserId>) -> Self {
        ServerEvent::TypingStatus(TypingStatusPayload {
            conversation_id,
            typing_users,
        })
    }

    /// The user-directed event for a booking status change.
    pub fn booking(notification: &BookingNotification) -> Self {
        let payload = BookingPayload {
            booking_id: notification.booking_id,
            listing: notification.listing.clone(),
            message: notification.message.clone(),
        };
        match notification.kind {
            BookingEventKind::Created => ServerEvent::BookingCreated(payload),
            BookingEventKind::Accepted => ServerEvent::BookingAccepted(payload),
            BookingEventKind::Rejected => ServerEvent::BookingRejected(payload),
            BookingEventKind::Cancelled => ServerEvent::BookingCancelled(payload),
        }
    }

    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::Ack(_) => "ack",
            ServerEvent::Pong(_) => "pong",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::TypingStatus(_) => "typing_status",
            ServerEvent::MessageRead(_) => "message_read",
            ServerEvent::BookingCreated(_) => BookingEventKind::Created.event_name(),
            ServerEvent::BookingAccepted(_) => BookingEventKind::Accepted.event_name(),
            ServerEvent::BookingRejected(_) => BookingEventKind::Rejected.event_name(),
            ServerEvent::BookingCancelled(_) => BookingEventKind::Cancelled.event_name(),
        }
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All events a client may send.
///
/// `userId` fields are optional on the wire; when present they must match
/// the identity the connection registered as.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Register(RegisterPayload),
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    OpenConversation(OpenConversationPayload),
    SendMessage(SendMessagePayload),
    TypingStart(ConversationRef),
    TypingStop(ConversationRef),
    MarkRead(ConversationRef),
    Ping,
}

impl ClientEvent {
    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register(_) => "register",
            ClientEvent::JoinConversation(_) => "join_conversation",
            ClientEvent::LeaveConversation(_) => "leave_conversation",
            ClientEvent::OpenConversation(_) => "open_conversation",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::TypingStart(_) => "typing_start",
            ClientEvent::TypingStop(_) => "typing_stop",
            ClientEvent::MarkRead(_) => "mark_read",
            ClientEvent::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub user_id: UserId,
}

/// Payload naming a conversation, optionally with the acting user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationPayload {
    pub other_user_id: UserId,
    #[serde(default)]
    pub listing_id: Option<ListingId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: ConversationId,
    #[serde(default, alias = "senderId")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub listing_id: Option<ListingId>,
}

/// A parsed client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    pub ack_id: Option<Value>,
    pub event: ClientEvent,
}

/// A frame that could not be parsed; still acknowledged with an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameError {
    pub ack_id: Option<Value>,
    pub message: String,
}

impl ClientFrame {
    pub fn new(event: ClientEvent) -> Self {
        Self {
            ack_id: None,
            event,
        }
    }

    pub fn with_ack_id(mut self, ack_id: impl Into<Value>) -> Self {
        self.ack_id = Some(ack_id.into());
        self
    }

    /// Parses a text frame.
    ///
    /// The `ackId` is recovered even when the event itself is invalid so
    /// the error can be correlated by the client.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(|e| FrameError {
            ack_id: None,
            message: format!("Malformed frame: {}", e),
        })?;

        let ack_id = value.get("ackId").filter(|v| !v.is_null()).cloned();

        let event = ClientEvent::deserialize(&value).map_err(|e| FrameError {
            ack_id: ack_id.clone(),
            message: format!("Invalid event: {}", e),
        })?;

        Ok(Self { ack_id, event })
    }
}

impl From<FrameError> for DomainError {
    fn from(err: FrameError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.message)
    }
}
