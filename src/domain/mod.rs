//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, auth)
//! - `chat` - Two-party conversations, messages and read receipts
//! - `notification` - Booking status notifications

pub mod chat;
pub mod foundation;
pub mod notification;
