//! Account signup, login, and lookups.

pub mod service;

pub use service::{LoginRequest, SignupRequest, UserService, provision};
