//! Share groups.

pub mod model;

pub use model::{Share, SharePolicies};
