//! WebSocket adapters for real-time chat and booking notifications.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              /ws/chat            /ws/notifications                   │
//! │                 handler (upgrade, socket read/write tasks)           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ ClientFrame / ServerEvent
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        RealtimeGateway                               │
//! │   ConnectionRegistry │ PresenceTracker │ RoomMembership │ Sequencer  │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │ persistence                          ▲ NotificationSink
//!            ▼                                      │
//!     ConversationStore                      BookingNotifier
//! ```
//!
//! # Components
//!
//! - [`messages`] - wire protocol types
//! - [`connection`] - connection ids and bounded outbound queues
//! - [`registry`] - user → connections index
//! - [`presence`] - per-conversation typing sets
//! - [`rooms`] - conversation room subscriptions
//! - [`sequencer`] - per-conversation ordering of persist + broadcast
//! - [`gateway`] - connection lifecycle and event dispatch
//! - [`handler`] - axum upgrade handlers

pub mod connection;
pub mod gateway;
pub mod handler;
pub mod messages;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod sequencer;

pub use connection::{ConnectionHandle, ConnectionId, DeliveryError, Namespace};
pub use gateway::{RealtimeGateway, DEFAULT_OUTBOUND_BUFFER};
pub use handler::{websocket_router, WebSocketState};
pub use messages::{Ack, AckStatus, ClientEvent, ClientFrame, ServerEvent};
pub use presence::PresenceTracker;
pub use registry::{ConnectionRegistry, Unregistered};
pub use rooms::RoomMembership;
pub use sequencer::ConversationSequencer;
