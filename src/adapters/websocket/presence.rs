//! Typing presence per conversation.
//!
//! Typing is a per-user fact: a user with two devices is typing once, and
//! stays in a set until they stop, send, or go fully offline.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use crate::domain::foundation::{ConversationId, UserId};

/// Conversation → users currently typing in it.
#[derive(Default)]
pub struct PresenceTracker {
    typing: RwLock<HashMap<ConversationId, BTreeSet<UserId>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the user as typing.
    ///
    /// Returns the full new set when it changed, `None` if the user was
    /// already typing.
    pub async fn start_typing(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
    ) -> Option<Vec<UserId>> {
        let mut typing = self.typing.write().await;
        let set = typing.entry(conversation_id).or_default();
        if !set.insert(user_id.clone()) {
            return None;
        }
        Some(set.iter().cloned().collect())
    }

    /// Clears the user's typing flag. Stopping an absent entry is a no-op.
    ///
    /// Returns the full new set (possibly empty) when it changed.
    pub async fn stop_typing(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
    ) -> Option<Vec<UserId>> {
        let mut typing = self.typing.write().await;
        let set = typing.get_mut(&conversation_id)?;
        if !set.remove(user_id) {
            return None;
        }
        let remaining: Vec<UserId> = set.iter().cloned().collect();
        if remaining.is_empty() {
            typing.remove(&conversation_id);
        }
        Some(remaining)
    }

    /// Users typing in a conversation, sorted.
    pub async fn typing_users_in(&self, conversation_id: ConversationId) -> Vec<UserId> {
        self.typing
            .read()
            .await
            .get(&conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes the user from every typing set.
    ///
    /// Returns each conversation that changed with its new full set.
    pub async fn clear_user(&self, user_id: &UserId) -> Vec<(ConversationId, Vec<UserId>)> {
        let mut typing = self.typing.write().await;
        let mut changed = Vec::new();

        typing.retain(|conversation_id, set| {
            if set.remove(user_id) {
                changed.push((*conversation_id, set.iter().cloned().collect()));
            }
            !set.is_empty()
        });

        changed
    }

    /// Number of conversations with at least one typist.
    pub async fn active_conversation_count(&self) -> usize {
        self.typing.read().await.len()
    }
}
