use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendResult;
use crate::types::{AttributeFilter, ItemKey, ObjectMeta, ObjectPage, QueryPage, Row, TableSchema, TableStatus};

/// Bucket-style blob storage.
///
/// Implementations must satisfy these invariants:
/// - Bucket creation is eventually consistent: a freshly created bucket may
///   report as absent for a while. Callers poll [`bucket_exists`].
/// - Individual object get/put/delete/copy are strongly consistent.
/// - A bucket can only be deleted once empty.
///
/// [`bucket_exists`]: ObjectBackend::bucket_exists
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Names of every bucket owned by the caller.
    async fn list_buckets(&self) -> BackendResult<Vec<String>>;

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool>;

    /// Create a bucket. Fails with `BucketAlreadyOwnedByYou` if it exists.
    async fn create_bucket(&self, bucket: &str) -> BackendResult<()>;

    /// Delete an empty bucket. Fails with `NoSuchBucket` or `BucketNotEmpty`.
    async fn delete_bucket(&self, bucket: &str) -> BackendResult<()>;

    /// One page of keys starting with `prefix`, in lexicographic order,
    /// resuming after `continuation` when given.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> BackendResult<ObjectPage>;

    /// Object metadata. Fails with `NoSuchBucket` or `NoSuchKey`.
    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectMeta>;

    /// Object content. Fails with `NoSuchBucket` or `NoSuchKey`.
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<Bytes>;

    /// Create or replace an object. Fails with `NoSuchBucket`.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<()>;

    /// Delete an object. Deleting an absent key succeeds, as on the real
    /// service; a missing bucket fails with `NoSuchBucket`.
    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()>;

    /// Server-side copy within one bucket.
    async fn copy_object(&self, bucket: &str, source: &str, destination: &str) -> BackendResult<()>;
}

/// Structured rows keyed by partition + sort key.
///
/// - Table creation is asynchronous: a new table reports `Creating` until it
///   becomes `Active`, and item operations fail with `ResourceNotFound` until
///   then.
/// - Queries are paged; each page is limited before the filter is applied.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn list_tables(&self) -> BackendResult<Vec<String>>;

    /// Start creating a table. Fails with `ResourceInUse` if it exists.
    async fn create_table(&self, schema: &TableSchema) -> BackendResult<()>;

    /// Current status. Fails with `ResourceNotFound` if the table is absent.
    async fn describe_table(&self, table: &str) -> BackendResult<TableStatus>;

    /// Delete a table and all its rows. Fails with `ResourceNotFound`.
    async fn delete_table(&self, table: &str) -> BackendResult<()>;

    /// `Ok(None)` when the row is absent from an existing table.
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>>;

    /// Create or replace the row identified by the schema's key attributes.
    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()>;

    /// Remove a row, returning the old row if there was one.
    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>>;

    /// One page of a partition, in sort-key order, resuming after
    /// `exclusive_start` when given.
    async fn query(
        &self,
        table: &str,
        partition: &str,
        filter: Option<&AttributeFilter>,
        exclusive_start: Option<&str>,
    ) -> BackendResult<QueryPage>;
}
