//! Core traits defined in `drive-core` and implemented by other crates.

pub mod identity;
pub mod storage;

pub use identity::{Identity, IdentityProvider};
pub use storage::{ObjectStorage, PresignedRequest};
