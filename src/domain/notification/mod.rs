//! Booking notifications bridged from the booking workflow.
//!
//! The booking state machine itself lives elsewhere; after each status
//! transition it hands us a `BookingNotification` to persist and deliver.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BookingId, ListingId, NotificationId, Timestamp, UserId};

/// Booking status transitions that users are told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Accepted,
    Rejected,
    Cancelled,
}

impl BookingEventKind {
    /// Wire name of the outbound realtime event.
    pub fn event_name(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "booking_created",
            BookingEventKind::Accepted => "booking_accepted",
            BookingEventKind::Rejected => "booking_rejected",
            BookingEventKind::Cancelled => "booking_cancelled",
        }
    }

    /// Notification type stored with the persisted record.
    pub fn notification_type(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "BOOKING_REQUEST",
            BookingEventKind::Accepted => "BOOKING_ACCEPTED",
            BookingEventKind::Rejected => "BOOKING_REJECTED",
            BookingEventKind::Cancelled => "BOOKING_CANCELLED",
        }
    }

    /// Headline shown in the notification list.
    pub fn title(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "New booking request",
            BookingEventKind::Accepted => "Booking accepted",
            BookingEventKind::Rejected => "Booking declined",
            BookingEventKind::Cancelled => "Booking cancelled",
        }
    }
}

/// Listing reference carried in booking payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRef {
    pub id: ListingId,
    pub title: String,
}

/// A booking status change addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingNotification {
    pub recipient: UserId,
    pub kind: BookingEventKind,
    pub booking_id: BookingId,
    pub listing: ListingRef,
    pub message: String,
}

impl BookingNotification {
    /// Builds the durable record for this notification.
    pub fn to_record(&self) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: self.recipient.clone(),
            notification_type: self.kind.notification_type().to_string(),
            title: self.kind.title().to_string(),
            body: self.message.clone(),
            booking_id: Some(self.booking_id),
            created_at: Timestamp::now(),
            read: false,
        }
    }
}

/// Append-only notification record; the durable fallback for offline users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub booking_id: Option<BookingId>,
    pub created_at: Timestamp,
    pub read: bool,
}
