//! In-memory adapters.
//!
//! Deterministic implementations of the persistence ports for tests and
//! for running the server without a database.

mod conversation_repository;
mod notification_repository;

pub use conversation_repository::InMemoryConversationRepository;
pub use notification_repository::InMemoryNotificationRepository;
