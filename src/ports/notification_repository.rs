//! Notification repository port.
//!
//! Append-only store for notification records. Every realtime booking
//! notification is paired with one record so the event survives the
//! recipient being offline.

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::notification::Notification;

use super::RepositoryError;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Append a notification record.
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError>;

    /// Most recent notifications for a user, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError>;
}
