//! ConversationStore - conversation lifecycle and message history.
//!
//! Wraps the `ConversationRepository` port with participant authorisation,
//! input validation, paging rules and the creation-race recovery for
//! `get_or_create`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::chat::{
    Conversation, ConversationSummary, Message, NewMessage, ParticipantPair, ReadReceipt,
};
use crate::domain::foundation::{
    ConversationId, DomainError, ListingId, Timestamp, UserId,
};
use crate::ports::{ConversationRepository, RepositoryError};

/// Page size used when a history request gives no limit.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page a history request may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Application service over durable conversations.
pub struct ConversationStore {
    repository: Arc<dyn ConversationRepository>,
    default_page_size: u32,
    max_page_size: u32,
}

impl ConversationStore {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            repository,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the history paging limits.
    pub fn with_page_limits(mut self, default_page_size: u32, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Returns the conversation between two users, creating it if needed.
    ///
    /// Argument order does not matter. When a concurrent caller creates the
    /// same pair first, the store's uniqueness constraint reports a conflict
    /// and the winner's conversation is returned instead. The listing
    /// association of an existing conversation is never changed.
    pub async fn get_or_create(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        listing_id: Option<ListingId>,
    ) -> Result<Conversation, DomainError> {
        let pair = ParticipantPair::new(user_a.clone(), user_b.clone())?;

        if let Some(existing) = self.repository.find_by_pair(&pair).await? {
            return Ok(existing);
        }

        let conversation = Conversation::new(pair.clone(), listing_id);
        match self.repository.create(&conversation).await {
            Ok(()) => {
                info!(
                    conversation_id = %conversation.id(),
                    user_low = %pair.low(),
                    user_high = %pair.high(),
                    "Conversation created"
                );
                Ok(conversation)
            }
            Err(RepositoryError::Conflict(detail)) => {
                warn!(
                    user_low = %pair.low(),
                    user_high = %pair.high(),
                    detail = %detail,
                    "Lost conversation creation race, re-reading"
                );
                match self.repository.find_by_pair(&pair).await? {
                    Some(winner) => Ok(winner),
                    None => {
                        error!(
                            user_low = %pair.low(),
                            user_high = %pair.high(),
                            "Creation conflict reported but no conversation exists for pair"
                        );
                        Err(DomainError::internal(
                            "Conversation creation conflicted but could not be read back",
                        ))
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Summaries of every conversation the user participates in, most
    /// recently active first.
    pub async fn conversations_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, DomainError> {
        Ok(self.repository.list_for_user(user_id).await?)
    }

    /// Loads a conversation, requiring the requester to participate.
    pub async fn get_by_id(
        &self,
        conversation_id: ConversationId,
        requester: &UserId,
    ) -> Result<Conversation, DomainError> {
        let conversation = self
            .repository
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| DomainError::conversation_not_found(conversation_id))?;

        conversation.ensure_participant(requester)?;
        Ok(conversation)
    }

    /// A page of history strictly older than `before`, oldest first.
    ///
    /// `limit` defaults to the configured page size and is clamped to
    /// `[1, max_page_size]`.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
        requester: &UserId,
        limit: Option<u32>,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, DomainError> {
        self.get_by_id(conversation_id, requester).await?;

        let limit = self.page_size(limit);
        let mut page = self
            .repository
            .list_messages(conversation_id, before, limit)
            .await?;
        page.reverse();
        Ok(page)
    }

    /// Persists a message from a participant.
    ///
    /// The insert and the conversation's `last_message_at` update commit
    /// together; `last_message_at` never moves backwards.
    pub async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: &UserId,
        content: Option<String>,
        image_url: Option<String>,
        listing_id: Option<ListingId>,
    ) -> Result<Message, DomainError> {
        self.get_by_id(conversation_id, sender).await?;
        let draft = NewMessage::new(content, image_url, listing_id)?;

        let message = draft.into_message(conversation_id, sender.clone(), Timestamp::now());
        self.repository.append_message(&message).await?;

        debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            sender_id = %sender,
            "Message persisted"
        );
        Ok(message)
    }

    /// Records that `user_id` has read the conversation up to now.
    pub async fn mark_read(
        &self,
        conversation_id: ConversationId,
        user_id: &UserId,
    ) -> Result<ReadReceipt, DomainError> {
        self.get_by_id(conversation_id, user_id).await?;

        let read_at = self
            .repository
            .mark_read(conversation_id, user_id, Timestamp::now())
            .await?;

        Ok(ReadReceipt {
            conversation_id,
            user_id: user_id.clone(),
            read_at,
        })
    }

    fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryConversationRepository;
    use crate::domain::foundation::ErrorCode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn store() -> (ConversationStore, Arc<InMemoryConversationRepository>) {
        let repo = Arc::new(InMemoryConversationRepository::new());
        (ConversationStore::new(repo.clone()), repo)
    }

    fn text(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // get_or_create
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn get_or_create_is_order_independent() {
        let (store, repo) = store();

        let first = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();
        let second = store.get_or_create(&user("b"), &user("a"), None).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(repo.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn get_or_create_keeps_original_listing() {
        let (store, _) = store();
        let listing = ListingId::new();

        let created = store
            .get_or_create(&user("a"), &user("b"), Some(listing))
            .await
            .unwrap();
        let again = store
            .get_or_create(&user("a"), &user("b"), Some(ListingId::new()))
            .await
            .unwrap();

        assert_eq!(created.listing_id(), Some(listing));
        assert_eq!(again.listing_id(), Some(listing));
    }

    #[tokio::test]
    async fn get_or_create_rejects_self_conversation() {
        let (store, _) = store();
        let err = store
            .get_or_create(&user("a"), &user("a"), None)
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_conversation() {
        let (store, repo) = store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let (x, y) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                store.get_or_create(&user(x), &user(y), None).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id());
        }

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(repo.conversation_count().await, 1);
    }

    /// Repository whose first pair lookup misses even though another writer
    /// already created the conversation, forcing the conflict path.
    struct RacingRepository {
        inner: InMemoryConversationRepository,
        lookups: AtomicUsize,
        hide_winner_on_retry: bool,
    }

    impl RacingRepository {
        async fn new(hide_winner_on_retry: bool) -> Self {
            let inner = InMemoryConversationRepository::new();
            let pair = ParticipantPair::new(user("a"), user("b")).unwrap();
            inner.create(&Conversation::new(pair, None)).await.unwrap();
            Self {
                inner,
                lookups: AtomicUsize::new(0),
                hide_winner_on_retry,
            }
        }
    }

    #[async_trait]
    impl ConversationRepository for RacingRepository {
        async fn find_by_pair(
            &self,
            pair: &ParticipantPair,
        ) -> Result<Option<Conversation>, RepositoryError> {
            let n = self.lookups.fetch_add(1, Ordering::SeqCst);
            if n == 0 || self.hide_winner_on_retry {
                return Ok(None);
            }
            self.inner.find_by_pair(pair).await
        }

        async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
            self.inner.create(conversation).await
        }

        async fn find_by_id(
            &self,
            id: ConversationId,
        ) -> Result<Option<Conversation>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn list_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<ConversationSummary>, RepositoryError> {
            self.inner.list_for_user(user_id).await
        }

        async fn list_messages(
            &self,
            id: ConversationId,
            before: Option<Timestamp>,
            limit: u32,
        ) -> Result<Vec<Message>, RepositoryError> {
            self.inner.list_messages(id, before, limit).await
        }

        async fn append_message(&self, message: &Message) -> Result<(), RepositoryError> {
            self.inner.append_message(message).await
        }

        async fn mark_read(
            &self,
            id: ConversationId,
            user_id: &UserId,
            at: Timestamp,
        ) -> Result<Timestamp, RepositoryError> {
            self.inner.mark_read(id, user_id, at).await
        }
    }

    #[tokio::test]
    async fn conflict_on_create_returns_the_winner() {
        let repo = Arc::new(RacingRepository::new(false).await);
        let store = ConversationStore::new(repo.clone());

        let conversation = store.get_or_create(&user("b"), &user("a"), None).await.unwrap();

        assert!(conversation.is_participant(&user("a")));
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(repo.inner.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn conflict_without_winner_is_internal_error() {
        let repo = Arc::new(RacingRepository::new(true).await);
        let store = ConversationStore::new(repo.clone());

        let err = store
            .get_or_create(&user("a"), &user("b"), None)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InternalError);
        // exactly one retry
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 2);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Authorisation and messages
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn get_by_id_distinguishes_missing_and_forbidden() {
        let (store, _) = store();
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();

        let missing = store
            .get_by_id(ConversationId::new(), &user("a"))
            .await
            .unwrap_err();
        assert_eq!(missing.code, ErrorCode::ConversationNotFound);

        let forbidden = store.get_by_id(conv.id(), &user("c")).await.unwrap_err();
        assert_eq!(forbidden.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn append_message_by_outsider_is_forbidden_and_not_persisted() {
        let (store, repo) = store();
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();

        let err = store
            .append_message(conv.id(), &user("c"), text("hi"), None, None)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Forbidden);
        assert_eq!(repo.message_count(conv.id()).await, 0);
    }

    #[tokio::test]
    async fn empty_message_is_invalid_argument() {
        let (store, repo) = store();
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();

        let err = store
            .append_message(conv.id(), &user("a"), text("   "), None, None)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(repo.message_count(conv.id()).await, 0);
    }

    #[tokio::test]
    async fn appends_are_listed_in_order_and_advance_activity() {
        let (store, _) = store();
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();

        let mut sent = Vec::new();
        for i in 0..5 {
            let sender = if i % 2 == 0 { "a" } else { "b" };
            sent.push(
                store
                    .append_message(conv.id(), &user(sender), text(&format!("m{i}")), None, None)
                    .await
                    .unwrap(),
            );
        }

        let history = store
            .list_messages(conv.id(), &user("a"), None, None)
            .await
            .unwrap();
        let ids: Vec<_> = history.iter().map(|m| m.id).collect();
        let expected: Vec<_> = sent.iter().map(|m| m.id).collect();
        assert_eq!(ids, expected);

        let reloaded = store.get_by_id(conv.id(), &user("b")).await.unwrap();
        assert_eq!(reloaded.last_message_at(), Some(sent[4].sent_at));
    }

    #[tokio::test]
    async fn limit_is_clamped_and_before_is_strict() {
        let (store, repo) = store();
        let store = store.with_page_limits(2, 3);
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();

        let t0 = Timestamp::now();
        for i in 0..5 {
            let msg = NewMessage::new(text(&format!("m{i}")), None, None)
                .unwrap()
                .into_message(conv.id(), user("a"), t0.plus_millis(i));
            repo.append_message(&msg).await.unwrap();
        }

        let default_page = store
            .list_messages(conv.id(), &user("a"), None, None)
            .await
            .unwrap();
        assert_eq!(default_page.len(), 2);

        let capped = store
            .list_messages(conv.id(), &user("a"), Some(1000), None)
            .await
            .unwrap();
        assert_eq!(capped.len(), 3);

        let zero = store
            .list_messages(conv.id(), &user("a"), Some(0), None)
            .await
            .unwrap();
        assert_eq!(zero.len(), 1);

        let older = store
            .list_messages(conv.id(), &user("a"), Some(10), Some(t0.plus_millis(3)))
            .await
            .unwrap();
        let texts: Vec<_> = older.iter().filter_map(|m| m.content.as_deref()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn mark_read_clears_unread_count() {
        let (store, _) = store();
        let conv = store.get_or_create(&user("a"), &user("b"), None).await.unwrap();
        store
            .append_message(conv.id(), &user("b"), text("ping"), None, None)
            .await
            .unwrap();

        let before = store.conversations_for(&user("a")).await.unwrap();
        assert_eq!(before[0].unread_count, 1);

        let receipt = store.mark_read(conv.id(), &user("a")).await.unwrap();
        assert_eq!(receipt.user_id, user("a"));

        let after = store.conversations_for(&user("a")).await.unwrap();
        assert_eq!(after[0].unread_count, 0);
    }
}
