//! Storage quota value objects.

pub mod quota;

pub use quota::UsageQuota;
