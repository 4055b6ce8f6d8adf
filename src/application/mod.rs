//! Application layer - services that orchestrate domain operations over ports.
//!
//! - `ConversationStore` - conversation lifecycle, history and read state
//! - `BookingNotifier` - persists and delivers booking notifications

mod booking_notifier;
mod conversation_store;

pub use booking_notifier::{BookingNotifier, NotifyResult};
pub use conversation_store::{ConversationStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
