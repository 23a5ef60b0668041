//! The capability set shared by every stored item.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use symstore_types::{SourceName, SymbolName, TypeError};

use crate::error::{StorageError, StorageResult};
use crate::naming;
use crate::object::ObjectWriter;

/// Exists / get / put / delete over one stored blob.
///
/// Implemented by [`PackageItem`](crate::PackageItem) and
/// [`RelatedItem`](crate::RelatedItem). The object store offers no public
/// addressing, so URI access is never available.
#[async_trait]
pub trait StorageItem: Send + Sync {
    /// Bucket name of the feed this item belongs to.
    fn feed_name(&self) -> &str;

    fn can_get_uri(&self) -> bool {
        false
    }

    async fn get_uri(&self) -> StorageResult<String> {
        Err(StorageError::NotSupported("direct object URIs"))
    }

    async fn exists(&self) -> StorageResult<bool>;

    /// Content, or `None` when absent.
    async fn get(&self) -> StorageResult<Option<Bytes>>;

    /// Copy content into a caller-provided buffer.
    async fn get_into(&self, _target: &mut Vec<u8>) -> StorageResult<()> {
        Err(StorageError::NotImplemented("reading into a provided buffer"))
    }

    /// Prepare the backing records and return a writer for the content.
    /// Nothing is stored until the writer is committed.
    async fn put(&self) -> StorageResult<ObjectWriter>;

    /// Store content from a caller-provided buffer in one call.
    async fn put_from(&self, _source: Bytes) -> StorageResult<()> {
        Err(StorageError::NotImplemented("writing from a provided buffer"))
    }

    async fn delete(&self) -> StorageResult<bool>;
}

/// Key-encoding strategy of content-addressed items.
pub trait ContentKey: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Table partition holding the reference set.
    fn partition_key(&self) -> String;

    /// Object path of the shared blob.
    fn object_path(&self) -> String;

    /// Reject keys whose partition key or path would be ambiguous.
    fn validate(&self) -> Result<(), TypeError>;
}

impl ContentKey for SymbolName {
    fn partition_key(&self) -> String {
        naming::symbol_partition_key(self)
    }

    fn object_path(&self) -> String {
        naming::symbol_path(self)
    }

    fn validate(&self) -> Result<(), TypeError> {
        SymbolName::validate(self)
    }
}

impl ContentKey for SourceName {
    fn partition_key(&self) -> String {
        naming::source_partition_key(self)
    }

    fn object_path(&self) -> String {
        naming::source_path(self)
    }

    fn validate(&self) -> Result<(), TypeError> {
        SourceName::validate(self)
    }
}
