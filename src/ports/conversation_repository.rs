//! Conversation repository port.
//!
//! Defines the persistence contract behind `ConversationStore`.
//!
//! # Design
//!
//! - **Pair-unique**: at most one conversation per unordered participant
//!   pair, enforced by the storage layer itself. `create` reports a
//!   violation as `RepositoryError::Conflict` so callers can recover from
//!   concurrent first contact.
//! - **Append-only messages**: a message insert and the conversation's
//!   `last_message_at` bump are one unit of work.

use async_trait::async_trait;

use crate::domain::chat::{Conversation, ConversationSummary, Message, ParticipantPair};
use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, Timestamp, UserId};

/// Errors surfaced by repository implementations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    /// The addressed record does not exist.
    #[error("Record not found")]
    NotFound,

    /// Storage communication error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(detail) => {
                DomainError::new(ErrorCode::Conflict, "Conflicting write").with_detail("detail", detail)
            }
            RepositoryError::NotFound => {
                DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found")
            }
            RepositoryError::Database(msg) => DomainError::new(ErrorCode::DatabaseError, msg),
        }
    }
}

/// Repository port for conversations and their messages.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find the conversation whose participants are exactly `pair`.
    async fn find_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Insert a new conversation together with both participant links.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a conversation for the same pair already exists
    /// - `Database` on persistence failure
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    /// Find a conversation by its ID.
    async fn find_by_id(&self, id: ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    /// All conversations of `user_id`, most recent activity first.
    ///
    /// Conversations without messages sort last, newest first. Each entry
    /// carries its latest message, both participants' summaries and the
    /// number of messages from the other participant newer than
    /// `user_id`'s read watermark.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;

    /// Up to `limit` messages strictly older than `before`, newest first.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<Timestamp>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// Persist a message and advance `last_message_at` to its `sent_at`
    /// (never backwards).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conversation doesn't exist
    async fn append_message(&self, message: &Message) -> Result<(), RepositoryError>;

    /// Advance `user_id`'s read watermark to `at` (never backwards) and
    /// return the effective value.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the participant link doesn't exist
    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<Timestamp, RepositoryError>;
}
