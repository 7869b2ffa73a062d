//! Bearer token encoding, decoding, and identity verification.

pub mod claims;
pub mod decoder;
pub mod encoder;
pub mod identity;

pub use claims::Claims;
pub use decoder::JwtDecoder;
pub use encoder::{AuthToken, JwtEncoder};
pub use identity::JwtIdentityProvider;
