//! BookingNotifier - bridge from booking status changes to users.
//!
//! Every notification is written to the notification store first, then
//! pushed to whatever connections the recipient currently holds. An
//! offline recipient still gets the durable record.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::notification::{BookingNotification, Notification};
use crate::ports::{NotificationRepository, NotificationSink};

/// Outcome of a single `notify` call.
#[derive(Debug, Clone)]
pub struct NotifyResult {
    pub record: Notification,
    /// Live connections the event was queued on.
    pub delivered: usize,
}

pub struct BookingNotifier {
    repository: Arc<dyn NotificationRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl BookingNotifier {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { repository, sink }
    }

    /// Persists the notification record, then delivers it live.
    ///
    /// A persistence failure aborts before any live delivery.
    pub async fn notify(
        &self,
        notification: BookingNotification,
    ) -> Result<NotifyResult, DomainError> {
        let record = notification.to_record();
        self.repository.append(&record).await?;

        let delivered = self.sink.deliver(&notification).await;

        info!(
            user_id = %notification.recipient,
            booking_id = %notification.booking_id,
            event = notification.kind.event_name(),
            delivered,
            "Booking notification dispatched"
        );

        Ok(NotifyResult { record, delivered })
    }

    /// Most recent notification records for a user, newest first.
    pub async fn recent_for(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        Ok(self.repository.list_for_user(user_id, limit).await?)
    }
}
