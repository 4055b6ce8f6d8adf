//! Conversation entity - a permanent two-party messaging channel.

use serde::Serialize;

use crate::domain::foundation::{ConversationId, DomainError, ListingId, Timestamp, UserId};

use super::ParticipantPair;

/// One side of a conversation.
///
/// Membership is permanent once created. `last_read_at` is the durable
/// read-receipt watermark for this participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    pub last_read_at: Option<Timestamp>,
}

impl Participant {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_read_at: None,
        }
    }
}

/// Conversation entity.
///
/// Uniquely keyed by its unordered participant pair. The optional listing
/// is context only and never part of the identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    id: ConversationId,
    #[serde(skip)]
    pair: ParticipantPair,
    listing_id: Option<ListingId>,
    created_at: Timestamp,
    last_message_at: Option<Timestamp>,
    participants: [Participant; 2],
}

impl Conversation {
    /// Creates a new conversation with no messages yet.
    pub fn new(pair: ParticipantPair, listing_id: Option<ListingId>) -> Self {
        let participants = [
            Participant::new(pair.low().clone()),
            Participant::new(pair.high().clone()),
        ];
        Self {
            id: ConversationId::new(),
            pair,
            listing_id,
            created_at: Timestamp::now(),
            last_message_at: None,
            participants,
        }
    }

    /// Reconstitutes a conversation from persistence.
    pub fn reconstitute(
        id: ConversationId,
        pair: ParticipantPair,
        listing_id: Option<ListingId>,
        created_at: Timestamp,
        last_message_at: Option<Timestamp>,
        last_read: [Option<Timestamp>; 2],
    ) -> Self {
        let [low_read, high_read] = last_read;
        let participants = [
            Participant {
                user_id: pair.low().clone(),
                last_read_at: low_read,
            },
            Participant {
                user_id: pair.high().clone(),
                last_read_at: high_read,
            },
        ];
        Self {
            id,
            pair,
            listing_id,
            created_at,
            last_message_at,
            participants,
        }
    }

    // === Accessors ===

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn pair(&self) -> &ParticipantPair {
        &self.pair
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.listing_id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_message_at(&self) -> Option<Timestamp> {
        self.last_message_at
    }

    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }

    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.pair.contains(user_id)
    }

    /// Fails with `Forbidden` unless `user_id` is one of the two participants.
    pub fn ensure_participant(&self, user_id: &UserId) -> Result<(), DomainError> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("User is not a participant of this conversation")
                .with_detail("conversation_id", self.id.to_string()))
        }
    }

    // === Mutations ===

    /// Records activity. Never moves `last_message_at` backwards.
    pub fn touch(&mut self, at: Timestamp) {
        self.last_message_at = Some(match self.last_message_at {
            Some(current) => current.latest(at),
            None => at,
        });
    }

    /// Advances the participant's read watermark. Never moves it backwards.
    ///
    /// Returns the effective watermark, or `None` for a non-participant.
    pub fn mark_read(&mut self, user_id: &UserId, at: Timestamp) -> Option<Timestamp> {
        let participant = self.participants.iter_mut().find(|p| &p.user_id == user_id)?;
        let effective = match participant.last_read_at {
            Some(current) => current.latest(at),
            None => at,
        };
        participant.last_read_at = Some(effective);
        Some(effective)
    }
}
