//! Bearer token issuance and validation
//!
//! The auth service issues HS256-signed JWTs; the api service validates them
//! with the same shared secret. Both sides go through [`TokenService`] so the
//! claim layout cannot drift between them.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while configuring, issuing or validating tokens
#[derive(Error, Debug)]
pub enum TokenError {
    /// Missing or invalid configuration
    #[error("Token configuration error: {0}")]
    Configuration(String),

    /// The token could not be encoded
    #[error("Failed to issue token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),

    /// The token is malformed, expired or signed with another key
    #[error("Invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    /// The system clock is before the unix epoch
    #[error("Failed to get current time")]
    Clock,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    pub secret: String,
    /// Access token expiration time in seconds (default: 1 day)
    pub access_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Shared signing secret (required, at least 32 bytes)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 86400)
    pub fn from_env() -> Result<Self, TokenError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| {
            TokenError::Configuration("JWT_SECRET environment variable not set".to_string())
        })?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);

        let config = JwtConfig {
            secret,
            access_token_expiry,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TokenError> {
        if self.secret.len() < 32 {
            return Err(TokenError::Configuration(
                "JWT_SECRET must be at least 32 bytes long".to_string(),
            ));
        }
        Ok(())
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User email at issuance time
    pub email: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Issues and validates bearer tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_expiry: u64,
}

impl TokenService {
    /// Initialize a new token service
    pub fn new(config: &JwtConfig) -> Result<Self, TokenError> {
        config.validate()?;

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(TokenService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_token_expiry: config.access_token_expiry,
        })
    }

    /// Generate an access token for a user
    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        let now = now_secs()?;

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
        };

        encode(
            &Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(TokenError::Issue)
    }

    /// Validate a token and return the claims
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Invalid)?;
        Ok(token_data.claims)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.access_token_expiry
    }
}

fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Clock)
}
