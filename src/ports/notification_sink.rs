//! Notification sink port.
//!
//! Live, user-directed delivery of booking notifications. The realtime
//! gateway implements this by pushing to every connection the recipient
//! holds; delivery is best-effort and never goes through conversation
//! rooms.

use async_trait::async_trait;

use crate::domain::notification::BookingNotification;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Push the notification to the recipient's live connections.
    ///
    /// Returns the number of connections it was queued on (zero when the
    /// recipient is offline).
    async fn deliver(&self, notification: &BookingNotification) -> usize;
}
