//! Read models for conversation lists.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

use super::{Conversation, Message};

/// Marketplace role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Renter,
    Landlord,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Renter => "RENTER",
            UserRole::Landlord => "LANDLORD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RENTER" => Some(UserRole::Renter),
            "LANDLORD" => Some(UserRole::Landlord),
            _ => None,
        }
    }
}

/// Public profile of a participant, as far as the chat list needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

impl UserSummary {
    /// Summary for a user whose profile is unknown to the store.
    pub fn anonymous(id: UserId) -> Self {
        Self {
            id,
            name: None,
            role: None,
        }
    }
}

/// A conversation as shown in a user's inbox.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    #[serde(rename = "users")]
    pub participants: Vec<UserSummary>,
    pub unread_count: u64,
}
