//! Session validation port for bearer token validation.
//!
//! Resolves the credential a client presents (HTTP `Authorization` header
//! or the `token` query parameter of a WebSocket upgrade) to a user
//! identity. Issuance and refresh belong to the identity subsystem.
//!
//! Implementations MUST reject expired tokens and tokens with a bad
//! signature.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without the `Bearer ` prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
