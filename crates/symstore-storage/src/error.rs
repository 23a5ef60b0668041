use symstore_backend::BackendError;
use symstore_types::{PackageName, TypeError};

/// Errors from storage-layer operations.
///
/// Absence is not an error here: read and delete paths report missing
/// buckets, tables, rows and objects as `None` / `false`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A named feed must already be lower-case.
    #[error("invalid feed name {0:?}: feed names must be lower-case")]
    InvalidFeedName(String),

    /// The operation writes on behalf of an owner but none was given.
    #[error("operation on {package} requires an owner")]
    MissingOwner { package: PackageName },

    /// Shared content can only be referenced or released by a package.
    #[error("operation on {content} requires a referencing package name")]
    MissingPackageName { content: String },

    /// A table sort key did not split into exactly `{id}*{version}`.
    #[error("malformed package sort key {0:?}")]
    MalformedSortKey(String),

    /// A domain identifier failed validation.
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// The requested owner differs from the owner recorded for the package.
    #[error("{package} is owned by another user (requested {requested:?})")]
    OwnershipMismatch {
        package: PackageName,
        requested: String,
    },

    /// The operation has no meaning for this backing model.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// A known capability gap.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A created resource never became visible or active.
    #[error("{resource} not ready after {attempts} attempts")]
    PollTimeout { resource: String, attempts: u32 },

    /// A bucket carries the feed prefix but matches no feed naming pattern.
    #[error("bucket {0:?} violates the feed naming convention")]
    NamingViolation(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by a backing service.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// `true` for caller errors that fail fast before any I/O.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidFeedName(_)
                | Self::MissingOwner { .. }
                | Self::MissingPackageName { .. }
                | Self::InvalidName(_)
        )
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
