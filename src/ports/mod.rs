//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `ConversationRepository` - Durable conversations, participant links and messages
//! - `NotificationRepository` - Append-only notification records
//! - `NotificationSink` - Live delivery of booking notifications
//! - `SessionValidator` - Bearer credential → user identity (AuthN collaborator)

mod conversation_repository;
mod notification_repository;
mod notification_sink;
mod session_validator;

pub use conversation_repository::{ConversationRepository, RepositoryError};
pub use notification_repository::NotificationRepository;
pub use notification_sink::NotificationSink;
pub use session_validator::SessionValidator;
