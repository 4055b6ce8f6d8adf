//! HTTP DTOs for conversation and notification endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::chat::Message;
use crate::domain::foundation::{ListingId, Timestamp, UserId};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/conversations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub other_user_id: UserId,
    #[serde(default)]
    pub listing_id: Option<ListingId>,
}

/// Query of `GET /api/conversations/:id/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePageParams {
    /// Page size; clamped by the store.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Only messages sent strictly before this instant (RFC 3339).
    #[serde(default)]
    pub before: Option<Timestamp>,
}

/// Query of `GET /api/notifications`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub limit: Option<u32>,
}

impl NotificationParams {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;

    /// Get the effective limit, capped at MAX_LIMIT.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A page of history, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub items: Vec<Message>,
    /// Pass as `before` to fetch the previous page.
    pub next_before: Option<Timestamp>,
}

impl MessagePage {
    pub fn new(items: Vec<Message>) -> Self {
        let next_before = items.first().map(|m| m.sent_at);
        Self { items, next_before }
    }
}
