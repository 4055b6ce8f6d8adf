//! Rental Realtime - chat and notification delivery for a rental marketplace.
//!
//! Renters and landlords hold one conversation per participant pair,
//! exchange messages over WebSocket connections with persisted history,
//! see who is typing, and receive booking notifications live on every
//! connected device.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
