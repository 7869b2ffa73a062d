//! [`IdentityProvider`] backed by signed bearer tokens.

use async_trait::async_trait;
use tracing::debug;

use drive_core::config::AuthConfig;
use drive_core::result::AppResult;
use drive_core::traits::{Identity, IdentityProvider};

use super::decoder::JwtDecoder;

/// Verifies bearer tokens issued by [`JwtEncoder`](super::JwtEncoder).
#[derive(Debug, Clone)]
pub struct JwtIdentityProvider {
    decoder: JwtDecoder,
}

impl JwtIdentityProvider {
    /// Creates a provider from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoder: JwtDecoder::new(config),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> AppResult<Identity> {
        let claims = self.decoder.decode(token)?;
        debug!(user_id = %claims.sub, "Bearer token verified");
        Ok(claims.identity())
    }
}
