//! Two-party chat between renters and landlords.
//!
//! - `ParticipantPair` - unordered identity key of a conversation
//! - `Conversation` - the channel itself, with per-participant read watermarks
//! - `Message` / `NewMessage` - append-only messages and their validated input
//! - `ConversationSummary` - inbox read model

mod conversation;
mod message;
mod pair;
mod summary;

pub use conversation::{Conversation, Participant};
pub use message::{Message, NewMessage, ReadReceipt};
pub use pair::ParticipantPair;
pub use summary::{ConversationSummary, UserRole, UserSummary};
