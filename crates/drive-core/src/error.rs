//! Unified application error types for the cloud drive.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested entry, share, or user does not exist.
    NotFound,
    /// The caller's access level is below what the operation requires.
    PermissionDenied,
    /// A read was refused without revealing whether the target exists.
    Refused,
    /// Authentication failed (bad credentials, invalid or expired token).
    Authentication,
    /// Input validation failed.
    Validation,
    /// A sibling with the same name and kind already exists.
    Collision,
    /// The owner's storage quota cannot absorb the request.
    QuotaExceeded,
    /// The caller's view of the hierarchy disagrees with the stored state.
    InconsistentState,
    /// The store rejected or failed a read or a change set.
    StorageFailure,
    /// The object storage backend failed.
    ObjectStorage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::Refused => write!(f, "REFUSED"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Collision => write!(f, "COLLISION"),
            Self::QuotaExceeded => write!(f, "QUOTA_EXCEEDED"),
            Self::InconsistentState => write!(f, "INCONSISTENT_STATE"),
            Self::StorageFailure => write!(f, "STORAGE_FAILURE"),
            Self::ObjectStorage => write!(f, "OBJECT_STORAGE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout the drive.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a name collision error.
    pub fn collision(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Collision, message)
    }

    /// Create a quota error.
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QuotaExceeded, message)
    }

    /// Create an inconsistent-state error.
    pub fn inconsistent_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InconsistentState, message)
    }

    /// Create a store failure.
    pub fn storage_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageFailure, message)
    }

    /// Create an object storage error.
    pub fn object_storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectStorage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Fold `NotFound` and `PermissionDenied` into a single `Refused` error.
    ///
    /// Read paths use this so callers cannot probe for entries they are not
    /// allowed to see. Every other kind passes through untouched.
    pub fn conceal(self) -> Self {
        match self.kind {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => Self {
                kind: ErrorKind::Refused,
                message: "Access refused".to_string(),
                source: Some(Box::new(self)),
            },
            _ => self,
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
