//! File and directory entries.

pub mod filter;
pub mod model;

pub use filter::ListFilter;
pub use model::{Entry, EntryPatch};
