//! # drive-service
//!
//! Business logic service layer for the cloud drive. Each service
//! combines the store, access resolution, and object storage to implement
//! one group of drive operations.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references. Every multi-row write is
//! described as a single change set and committed atomically.

pub mod bin;
pub mod context;
pub mod hierarchy;
pub mod naming;
pub mod quota;
pub mod services;
pub mod share;
pub mod tree;
pub mod upload;
pub mod user;

mod guard;
#[cfg(test)]
mod testing;

pub use bin::{BinService, PurgeReport, SweepReport};
pub use context::RequestContext;
pub use hierarchy::{HierarchyService, MoveItem, MoveRequest};
pub use quota::{QuotaService, UploadName};
pub use services::DriveServices;
pub use share::ShareService;
pub use upload::{UploadItem, UploadService, UploadedEntry};
pub use user::{LoginRequest, SignupRequest, UserService};
