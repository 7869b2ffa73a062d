//! Bearer token creation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drive_core::config::AuthConfig;
use drive_core::error::{AppError, ErrorKind};
use drive_entity::user::User;

use super::claims::Claims;

/// A signed token handed to a client after signup or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Signed JWT.
    pub token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Value for an `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

/// Creates signed bearer tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Token TTL in hours.
    ttl_hours: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl_hours: config.token_ttl_hours as i64,
        }
    }

    /// Issues a token for `user` embedding its drive and bin roots.
    pub fn issue(&self, user: &User) -> Result<AuthToken, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(self.ttl_hours);

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            drive: user.drive_id,
            bin: user.bin_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to encode token", e))?;

        Ok(AuthToken {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
        })
    }
}
