//! Per-conversation ordering of persist + broadcast.
//!
//! Holding a conversation's sequence guard across `append_message` and the
//! room broadcast makes room delivery order equal persistence order.
//! Different conversations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::foundation::ConversationId;

type Slot = Arc<AsyncMutex<()>>;

/// Async mutex per conversation, created on demand.
#[derive(Default)]
pub struct ConversationSequencer {
    slots: Mutex<HashMap<ConversationId, Slot>>,
}

/// Exclusive turn for one conversation. Released on drop.
pub struct SequenceGuard<'a> {
    sequencer: &'a ConversationSequencer,
    conversation_id: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ConversationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for this conversation's turn.
    pub async fn lock(&self, conversation_id: ConversationId) -> SequenceGuard<'_> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(conversation_id)
            .or_default()
            .clone();

        let guard = slot.lock_owned().await;
        SequenceGuard {
            sequencer: self,
            conversation_id,
            guard: Some(guard),
        }
    }

    /// Conversations with a holder or waiter.
    pub fn active_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for SequenceGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut slots = self
            .sequencer
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map's own reference left: no holder, no waiter.
        if slots
            .get(&self.conversation_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.conversation_id);
        }
    }
}
