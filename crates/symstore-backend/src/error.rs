use crate::fault::Operation;

/// Errors reported by a backing service.
///
/// Variant names follow the service error codes the storage layer branches
/// on, so that layer can map exactly the codes it expects to "absent" and
/// propagate everything else.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// The object does not exist in an existing bucket.
    #[error("no such key: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    /// Bucket creation raced with (or repeated) our own earlier creation.
    #[error("bucket already owned by you: {0}")]
    BucketAlreadyOwnedByYou(String),

    /// A bucket can only be deleted once it holds no objects.
    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    /// The table does not exist or is not yet active.
    #[error("table not found: {0}")]
    ResourceNotFound(String),

    /// The table already exists (or is being created).
    #[error("table already exists: {0}")]
    ResourceInUse(String),

    /// A row is missing a key attribute required by the table schema.
    #[error("invalid item for table {table}: {reason}")]
    Validation { table: String, reason: String },

    /// Any other service-side failure.
    #[error("service error: {0}")]
    Service(String),

    /// A failure scheduled through a [`FaultPlan`](crate::FaultPlan).
    #[error("injected fault at {0}")]
    Injected(Operation),
}

impl BackendError {
    /// `true` for the object-store codes that mean "bucket or key absent".
    pub fn is_missing_object(&self) -> bool {
        matches!(self, Self::NoSuchBucket(_) | Self::NoSuchKey { .. })
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
