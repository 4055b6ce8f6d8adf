//! HTTP adapter for conversation and notification endpoints.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{CreateConversationRequest, MessagePage, MessagePageParams, NotificationParams};
pub use handlers::ConversationAppState;
pub use routes::{conversation_router, conversation_routes};
