//! Bin lifecycle: binning, restoring, purging, and the expiry sweep.

pub mod restore;
pub mod service;

pub use service::{BinService, PurgeReport, SweepReport};
