//! Chat messages and read receipts.

use serde::Serialize;

use crate::domain::foundation::{
    ConversationId, DomainError, ListingId, MessageId, Timestamp, UserId,
};

/// A single message in a conversation.
///
/// Immutable once created: delivery is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub listing_id: Option<ListingId>,
    pub sent_at: Timestamp,
}

/// Validated input for a new message, before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    content: Option<String>,
    image_url: Option<String>,
    listing_id: Option<ListingId>,
}

impl NewMessage {
    /// Normalises and validates message input.
    ///
    /// Content and image URL are trimmed; blank strings count as absent.
    /// At least one of them must remain.
    pub fn new(
        content: Option<String>,
        image_url: Option<String>,
        listing_id: Option<ListingId>,
    ) -> Result<Self, DomainError> {
        let content = non_blank(content);
        let image_url = non_blank(image_url);

        if content.is_none() && image_url.is_none() {
            return Err(DomainError::validation(
                "content",
                "Message must have text content or an image",
            ));
        }

        Ok(Self {
            content,
            image_url,
            listing_id,
        })
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Stamps the draft with an id, sender and send time.
    pub fn into_message(
        self,
        conversation_id: ConversationId,
        sender_id: UserId,
        sent_at: Timestamp,
    ) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            content: self.content,
            image_url: self.image_url,
            listing_id: self.listing_id,
            sent_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Result of marking a conversation read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub read_at: Timestamp,
}
