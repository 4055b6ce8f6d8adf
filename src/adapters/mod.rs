//! Adapters - Implementations of port interfaces and transport surfaces.
//!
//! - `auth` - session validators (JWT, mock)
//! - `memory` - in-memory repositories for tests and local runs
//! - `postgres` - PostgreSQL repositories
//! - `websocket` - realtime gateway and socket handling
//! - `http` - REST endpoints and router assembly

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod websocket;
