//! Share groups applied to entries.

pub mod service;

pub use service::ShareService;
