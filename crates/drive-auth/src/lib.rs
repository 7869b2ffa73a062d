//! # drive-auth
//!
//! Authentication and authorization for the cloud drive.
//!
//! ## Modules
//!
//! - `jwt`: bearer token issuing and verification
//! - `password`: Argon2id password hashing
//! - `acl`: entry access resolution through ownership and share groups

pub mod acl;
pub mod jwt;
pub mod password;

pub use acl::AccessResolver;
pub use jwt::{Claims, JwtDecoder, JwtEncoder, JwtIdentityProvider};
pub use password::PasswordHasher;
