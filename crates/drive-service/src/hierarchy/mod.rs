//! Browsing and rearranging the entry tree.

pub mod service;

pub use service::{HierarchyService, MoveItem, MoveRequest};
