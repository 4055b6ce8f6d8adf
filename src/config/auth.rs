//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Authentication configuration (HS256 bearer tokens issued by the identity service)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify access tokens
    #[serde(default = "empty_secret")]
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, if the identity service sets one
    #[serde(default)]
    pub issuer: Option<String>,

    /// Reject WebSocket upgrades and API calls without a valid token
    #[serde(default = "default_require_token")]
    pub require_token: bool,

    /// Shared token the booking workflow presents on the internal
    /// notification route. The route is not mounted without one.
    #[serde(default)]
    pub internal_token: Option<SecretString>,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// A secret is required whenever tokens are required. Production
    /// additionally rejects secrets shorter than 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if self.require_token && secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        if let Some(token) = &self.internal_token {
            if token.expose_secret().len() < 32 {
                return Err(ValidationError::WeakInternalToken);
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: empty_secret(),
            issuer: None,
            require_token: default_require_token(),
            internal_token: None,
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_require_token() -> bool {
    true
}
