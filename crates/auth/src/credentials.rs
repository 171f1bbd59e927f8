//! Secure API credential management.
//!
//! Uses the `secrecy` crate to prevent accidental logging of the secret key
//! and to zero its memory on drop.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// Header names the brokerage expects on every authenticated request.
pub const KEY_ID_HEADER: &str = "APCA-API-KEY-ID";
pub const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// API credentials for authenticated requests.
#[derive(Clone)]
pub struct ApiCredentials {
    key_id: String,
    secret: SecretString,
}

impl ApiCredentials {
    /// Load credentials from environment variables.
    ///
    /// Looks for:
    /// - `BROKER_API_KEY_ID` - The key id (public)
    /// - `BROKER_API_SECRET` - The secret key (private)
    ///
    /// # Errors
    /// Returns `AuthError::MissingEnvVar` if either variable is not set.
    pub fn from_env() -> Result<Self, AuthError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();

        let key_id = std::env::var("BROKER_API_KEY_ID")
            .map_err(|_| AuthError::MissingEnvVar("BROKER_API_KEY_ID".into()))?;

        let secret = std::env::var("BROKER_API_SECRET")
            .map_err(|_| AuthError::MissingEnvVar("BROKER_API_SECRET".into()))?;

        Ok(Self::new(key_id, secret))
    }

    /// Create credentials from explicit values.
    ///
    /// Useful for testing or when credentials come from other sources.
    pub fn new(key_id: String, secret: String) -> Self {
        Self {
            key_id,
            secret: SecretString::from(secret),
        }
    }

    /// Get the key id (public, safe to log).
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Header pairs to attach to an authenticated request.
    ///
    /// The second pair carries the secret; never log the return value.
    pub fn header_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (KEY_ID_HEADER, self.key_id.as_str()),
            (SECRET_HEADER, self.secret.expose_secret()),
        ]
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = ApiCredentials::new("my_key_id".into(), "my_secret".into());
        assert_eq!(creds.key_id(), "my_key_id");
        assert_eq!(creds.header_pairs()[1].1, "my_secret");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new("my_key_id".into(), "super_secret_key".into());
        let debug_str = format!("{:?}", creds);

        assert!(debug_str.contains("my_key_id"));
        assert!(!debug_str.contains("super_secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
