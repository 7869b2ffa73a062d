//! Access levels.

pub mod access;

pub use access::Access;
