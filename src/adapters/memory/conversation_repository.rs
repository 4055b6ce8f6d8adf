//! In-memory conversation repository.
//!
//! Used by tests and by the server when no database URL is configured.
//! Enforces the same pair-uniqueness rule as the PostgreSQL schema, so
//! racing `create` calls observe a `Conflict` exactly as they would
//! against the real store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::chat::{
    Conversation, ConversationSummary, Message, ParticipantPair, UserSummary,
};
use crate::domain::foundation::{ConversationId, Timestamp, UserId};
use crate::ports::{ConversationRepository, RepositoryError};

#[derive(Default)]
struct State {
    conversations: HashMap<ConversationId, Conversation>,
    by_pair: HashMap<ParticipantPair, ConversationId>,
    /// Messages per conversation in insertion order.
    messages: HashMap<ConversationId, Vec<Message>>,
}

/// In-memory implementation of `ConversationRepository`.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    state: RwLock<State>,
    users: RwLock<HashMap<UserId, UserSummary>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user profile so summaries carry name and role.
    pub async fn add_user(&self, user: UserSummary) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Number of stored conversations (for test assertions).
    pub async fn conversation_count(&self) -> usize {
        self.state.read().await.conversations.len()
    }

    /// Number of stored messages in a conversation (for test assertions).
    pub async fn message_count(&self, id: ConversationId) -> usize {
        self.state
            .read()
            .await
            .messages
            .get(&id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Messages sorted by send time; ties keep insertion order.
fn chronological(messages: &[Message]) -> Vec<Message> {
    let mut sorted = messages.to_vec();
    sorted.sort_by_key(|m| m.sent_at);
    sorted
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .by_pair
            .get(pair)
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        if state.by_pair.contains_key(conversation.pair()) {
            return Err(RepositoryError::Conflict(
                "conversation already exists for participant pair".to_string(),
            ));
        }
        if state.conversations.contains_key(&conversation.id()) {
            return Err(RepositoryError::Conflict(
                "conversation id already exists".to_string(),
            ));
        }

        state
            .by_pair
            .insert(conversation.pair().clone(), conversation.id());
        state
            .conversations
            .insert(conversation.id(), conversation.clone());
        state.messages.insert(conversation.id(), Vec::new());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let state = self.state.read().await;
        let users = self.users.read().await;

        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .map(|conversation| {
                let messages = state
                    .messages
                    .get(&conversation.id())
                    .map(|m| chronological(m))
                    .unwrap_or_default();

                let last_read = conversation
                    .participant(user_id)
                    .and_then(|p| p.last_read_at);
                let unread_count = messages
                    .iter()
                    .filter(|m| &m.sender_id != user_id)
                    .filter(|m| last_read.map_or(true, |read| m.sent_at.is_after(&read)))
                    .count() as u64;

                let participants = conversation
                    .pair()
                    .members()
                    .into_iter()
                    .map(|id| {
                        users
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| UserSummary::anonymous(id.clone()))
                    })
                    .collect();

                ConversationSummary {
                    conversation: conversation.clone(),
                    last_message: messages.last().cloned(),
                    participants,
                    unread_count,
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            let a_conv = &a.conversation;
            let b_conv = &b.conversation;
            // None sorts below Some, so reversing puts active conversations first.
            b_conv
                .last_message_at()
                .cmp(&a_conv.last_message_at())
                .then_with(|| b_conv.created_at().cmp(&a_conv.created_at()))
        });

        Ok(summaries)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<Timestamp>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let Some(messages) = state.messages.get(&conversation_id) else {
            return Ok(Vec::new());
        };

        Ok(chronological(messages)
            .into_iter()
            .rev()
            .filter(|m| before.map_or(true, |cursor| m.sent_at.is_before(&cursor)))
            .take(limit as usize)
            .collect())
    }

    async fn append_message(&self, message: &Message) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        let conversation = state
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.touch(message.sent_at);

        state
            .messages
            .entry(message.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<Timestamp, RepositoryError> {
        let mut state = self.state.write().await;
        state
            .conversations
            .get_mut(&conversation_id)
            .and_then(|c| c.mark_read(user_id, at))
            .ok_or(RepositoryError::NotFound)
    }
}
