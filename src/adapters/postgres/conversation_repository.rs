//! PostgreSQL implementation of ConversationRepository.
//!
//! Pair uniqueness is enforced by the `conversations_pair_unique`
//! constraint on the normalised `(user_low, user_high)` columns; a
//! violation surfaces as `RepositoryError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::chat::{
    Conversation, ConversationSummary, Message, ParticipantPair, UserRole, UserSummary,
};
use crate::domain::foundation::{
    ConversationId, ListingId, MessageId, Timestamp, UserId,
};
use crate::ports::{ConversationRepository, RepositoryError};

/// PostgreSQL implementation of ConversationRepository.
#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    /// Creates a new PostgresConversationRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONVERSATION_COLUMNS: &str = r#"
    c.id, c.user_low, c.user_high, c.listing_id, c.created_at, c.last_message_at,
    pl.last_read_at AS low_read_at, ph.last_read_at AS high_read_at
"#;

const PARTICIPANT_JOINS: &str = r#"
    JOIN conversation_participants pl
      ON pl.conversation_id = c.id AND pl.user_id = c.user_low
    JOIN conversation_participants ph
      ON ph.conversation_id = c.id AND ph.user_id = c.user_high
"#;

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn find_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c {PARTICIPANT_JOINS} \
             WHERE c.user_low = $1 AND c.user_high = $2"
        );
        let row = sqlx::query(&sql)
            .bind(pair.low().as_str())
            .bind(pair.high().as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("fetch conversation by pair", e))?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database("start transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_low, user_high, listing_id, created_at, last_message_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.pair().low().as_str())
        .bind(conversation.pair().high().as_str())
        .bind(conversation.listing_id().map(|l| *l.as_uuid()))
        .bind(conversation.created_at().as_datetime())
        .bind(conversation.last_message_at().map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error("insert conversation", e))?;

        for participant in conversation.participants() {
            sqlx::query(
                r#"
                INSERT INTO conversation_participants (conversation_id, user_id, last_read_at)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(conversation.id().as_uuid())
            .bind(participant.user_id.as_str())
            .bind(participant.last_read_at.map(|t| *t.as_datetime()))
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error("insert participant", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| write_error("commit conversation", e))
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c {PARTICIPANT_JOINS} WHERE c.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("fetch conversation", e))?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {CONVERSATION_COLUMNS},
                   lm.id AS lm_id, lm.sender_id AS lm_sender_id, lm.content AS lm_content,
                   lm.image_url AS lm_image_url, lm.listing_id AS lm_listing_id,
                   lm.sent_at AS lm_sent_at,
                   ul.name AS low_name, ul.role AS low_role,
                   uh.name AS high_name, uh.role AS high_role,
                   (SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.sender_id <> $1
                       AND (me.last_read_at IS NULL OR m.sent_at > me.last_read_at)
                   ) AS unread_count
            FROM conversations c
            JOIN conversation_participants me
              ON me.conversation_id = c.id AND me.user_id = $1
            {PARTICIPANT_JOINS}
            LEFT JOIN LATERAL (
                SELECT id, sender_id, content, image_url, listing_id, sent_at
                FROM messages
                WHERE conversation_id = c.id
                ORDER BY sent_at DESC, seq DESC
                LIMIT 1
            ) lm ON TRUE
            LEFT JOIN users ul ON ul.id = c.user_low
            LEFT JOIN users uh ON uh.id = c.user_high
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database("list conversations", e))?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<Timestamp>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, image_url, listing_id, sent_at
            FROM messages
            WHERE conversation_id = $1
              AND ($2::timestamptz IS NULL OR sent_at < $2)
            ORDER BY sent_at DESC, seq DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(before.map(|t| *t.as_datetime()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("list messages", e))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn append_message(&self, message: &Message) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database("start transaction", e))?;

        // Timestamp first: a later failure rolls both back together.
        let touched = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_at = GREATEST(COALESCE(last_message_at, $2), $2)
            WHERE id = $1
            "#,
        )
        .bind(message.conversation_id.as_uuid())
        .bind(message.sent_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| database("touch conversation", e))?;

        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, image_url, listing_id, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.conversation_id.as_uuid())
        .bind(message.sender_id.as_str())
        .bind(message.content.as_deref())
        .bind(message.image_url.as_deref())
        .bind(message.listing_id.map(|l| *l.as_uuid()))
        .bind(message.sent_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error("insert message", e))?;

        tx.commit()
            .await
            .map_err(|e| database("commit message", e))
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<Timestamp, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE conversation_participants
            SET last_read_at = GREATEST(COALESCE(last_read_at, $3), $3)
            WHERE conversation_id = $1 AND user_id = $2
            RETURNING last_read_at
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_str())
        .bind(at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database("mark read", e))?
        .ok_or(RepositoryError::NotFound)?;

        let read_at: DateTime<Utc> = column(&row, "last_read_at")?;
        Ok(Timestamp::from_datetime(read_at))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Row mapping
// ════════════════════════════════════════════════════════════════════════════════

fn database(context: &str, e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(format!("Failed to {}: {}", context, e))
}

/// Like `database`, but reports unique-constraint violations as `Conflict`.
fn write_error(context: &str, e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(format!(
                "{} violated {}",
                context,
                db.constraint().unwrap_or("a unique constraint")
            ));
        }
    }
    database(context, e)
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to decode column {}: {}", name, e)))
}

fn user_id(raw: String) -> Result<UserId, RepositoryError> {
    UserId::new(raw).map_err(|e| RepositoryError::Database(format!("Corrupt user id: {}", e)))
}

fn conversation_from_row(row: &PgRow) -> Result<Conversation, RepositoryError> {
    let id: Uuid = column(row, "id")?;
    let low = user_id(column(row, "user_low")?)?;
    let high = user_id(column(row, "user_high")?)?;
    let listing_id: Option<Uuid> = column(row, "listing_id")?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;
    let last_message_at: Option<DateTime<Utc>> = column(row, "last_message_at")?;
    let low_read_at: Option<DateTime<Utc>> = column(row, "low_read_at")?;
    let high_read_at: Option<DateTime<Utc>> = column(row, "high_read_at")?;

    let pair = ParticipantPair::new(low, high)
        .map_err(|e| RepositoryError::Database(format!("Corrupt participant pair: {}", e)))?;

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(id),
        pair,
        listing_id.map(ListingId::from_uuid),
        Timestamp::from_datetime(created_at),
        last_message_at.map(Timestamp::from_datetime),
        [
            low_read_at.map(Timestamp::from_datetime),
            high_read_at.map(Timestamp::from_datetime),
        ],
    ))
}

fn message_from_row(row: &PgRow) -> Result<Message, RepositoryError> {
    let id: Uuid = column(row, "id")?;
    let conversation_id: Uuid = column(row, "conversation_id")?;
    let listing_id: Option<Uuid> = column(row, "listing_id")?;
    let sent_at: DateTime<Utc> = column(row, "sent_at")?;

    Ok(Message {
        id: MessageId::from_uuid(id),
        conversation_id: ConversationId::from_uuid(conversation_id),
        sender_id: user_id(column(row, "sender_id")?)?,
        content: column(row, "content")?,
        image_url: column(row, "image_url")?,
        listing_id: listing_id.map(ListingId::from_uuid),
        sent_at: Timestamp::from_datetime(sent_at),
    })
}

fn user_summary(
    id: &UserId,
    name: Option<String>,
    role: Option<String>,
) -> UserSummary {
    UserSummary {
        id: id.clone(),
        name,
        role: role.as_deref().and_then(UserRole::parse),
    }
}

fn summary_from_row(row: &PgRow) -> Result<ConversationSummary, RepositoryError> {
    let conversation = conversation_from_row(row)?;

    let last_message = match column::<Option<Uuid>>(row, "lm_id")? {
        Some(id) => {
            let listing_id: Option<Uuid> = column(row, "lm_listing_id")?;
            let sent_at: DateTime<Utc> = column(row, "lm_sent_at")?;
            Some(Message {
                id: MessageId::from_uuid(id),
                conversation_id: conversation.id(),
                sender_id: user_id(column(row, "lm_sender_id")?)?,
                content: column(row, "lm_content")?,
                image_url: column(row, "lm_image_url")?,
                listing_id: listing_id.map(ListingId::from_uuid),
                sent_at: Timestamp::from_datetime(sent_at),
            })
        }
        None => None,
    };

    let participants = vec![
        user_summary(
            conversation.pair().low(),
            column(row, "low_name")?,
            column(row, "low_role")?,
        ),
        user_summary(
            conversation.pair().high(),
            column(row, "high_name")?,
            column(row, "high_role")?,
        ),
    ];

    let unread_count: i64 = column(row, "unread_count")?;

    Ok(ConversationSummary {
        conversation,
        last_message,
        participants,
        unread_count: unread_count.max(0) as u64,
    })
}
