//! PostgreSQL implementation of NotificationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{BookingId, NotificationId, Timestamp, UserId};
use crate::domain::notification::Notification;
use crate::ports::{NotificationRepository, RepositoryError};

/// PostgreSQL implementation of NotificationRepository.
#[derive(Clone)]
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, body, booking_id, created_at, read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_str())
        .bind(&notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.booking_id.map(|b| *b.as_uuid()))
        .bind(notification.created_at.as_datetime())
        .bind(notification.read)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to insert notification: {}", e)))?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, type, title, body, booking_id, created_at, read
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to list notifications: {}", e)))?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| {
                    RepositoryError::Database(format!("Failed to decode notification: {}", e))
                };
                let id: Uuid = row.try_get("id").map_err(decode)?;
                let user: String = row.try_get("user_id").map_err(decode)?;
                let booking_id: Option<Uuid> = row.try_get("booking_id").map_err(decode)?;
                let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

                Ok(Notification {
                    id: NotificationId::from_uuid(id),
                    user_id: UserId::new(user).map_err(|e| {
                        RepositoryError::Database(format!("Corrupt user id: {}", e))
                    })?,
                    notification_type: row.try_get("type").map_err(decode)?,
                    title: row.try_get("title").map_err(decode)?,
                    body: row.try_get("body").map_err(decode)?,
                    booking_id: booking_id.map(BookingId::from_uuid),
                    created_at: Timestamp::from_datetime(created_at),
                    read: row.try_get("read").map_err(decode)?,
                })
            })
            .collect()
    }
}
