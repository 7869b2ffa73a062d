//! Bin registry records.

pub mod model;

pub use model::{BinRecord, BinnedEntry};
