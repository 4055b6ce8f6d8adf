//! HTTP adapters - REST endpoints, internal booking ingress, auth middleware
//! and router assembly.

pub mod booking;
pub mod conversation;
pub mod error;
pub mod middleware;
pub mod router;

pub use booking::{booking_ingress_router, BookingIngressState};
pub use conversation::{conversation_router, ConversationAppState};
pub use error::{ApiError, ErrorResponse};
pub use router::{app_router, AppServices, HealthResponse};
