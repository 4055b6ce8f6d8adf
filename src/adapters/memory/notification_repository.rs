//! In-memory notification repository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::UserId;
use crate::domain::notification::Notification;
use crate::ports::{NotificationRepository, RepositoryError};

/// In-memory implementation of `NotificationRepository`.
#[derive(Default)]
pub struct InMemoryNotificationRepository {
    records: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records in insertion order (for test assertions).
    pub async fn all(&self) -> Vec<Notification> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError> {
        self.records.write().await.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|n| &n.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{BookingId, ListingId};
    use crate::domain::notification::{BookingEventKind, BookingNotification, ListingRef};

    fn record(user: &str, kind: BookingEventKind) -> Notification {
        BookingNotification {
            recipient: UserId::new(user).unwrap(),
            kind,
            booking_id: BookingId::new(),
            listing: ListingRef {
                id: ListingId::new(),
                title: "Loft".into(),
            },
            message: "update".into(),
        }
        .to_record()
    }

    #[tokio::test]
    async fn list_for_user_is_newest_first_and_filtered() {
        let repo = InMemoryNotificationRepository::new();
        repo.append(&record("a", BookingEventKind::Created)).await.unwrap();
        repo.append(&record("b", BookingEventKind::Created)).await.unwrap();
        repo.append(&record("a", BookingEventKind::Accepted)).await.unwrap();

        let list = repo
            .list_for_user(&UserId::new("a").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Booking accepted");
        assert_eq!(repo.all().await.len(), 3);
    }
}
