//! Bearer token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use drive_core::config::AuthConfig;
use drive_core::error::AppError;

use super::claims::Claims;

/// Validates signed bearer tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token, with or without its `Bearer ` prefix.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let raw = token
            .trim()
            .strip_prefix("Bearer ")
            .unwrap_or(token.trim())
            .trim();
        if raw.is_empty() {
            return Err(AppError::authentication("Missing bearer token"));
        }

        decode::<Claims>(raw, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authentication("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authentication("Invalid token signature")
                }
                _ => AppError::authentication(format!("Token validation failed: {e}")),
            })
    }
}
