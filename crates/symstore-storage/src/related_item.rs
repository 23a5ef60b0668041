use async_trait::async_trait;
use bytes::Bytes;
use symstore_types::PackageName;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::item::{ContentKey, StorageItem};
use crate::object::{ObjectReference, ObjectWriter};
use crate::related::RelatedItemIndex;

/// Content shared between packages: a symbol or a source file.
///
/// The blob at [`ContentKey::object_path`] is kept while at least one
/// package references it. Writes and deletes act on behalf of the package
/// given at construction.
#[derive(Clone, Debug)]
pub struct RelatedItem<K: ContentKey> {
    package: Option<PackageName>,
    key: K,
    index: RelatedItemIndex,
    object: ObjectReference,
}

impl<K: ContentKey> RelatedItem<K> {
    pub(crate) fn new(
        package: Option<PackageName>,
        key: K,
        index: RelatedItemIndex,
        object: ObjectReference,
    ) -> Self {
        Self {
            package,
            key,
            index,
            object,
        }
    }

    pub fn content_key(&self) -> &K {
        &self.key
    }

    /// The referencing package this item acts for.
    pub fn package(&self) -> Option<&PackageName> {
        self.package.as_ref()
    }

    /// The set of packages referencing this content.
    pub fn package_names(&self) -> &RelatedItemIndex {
        &self.index
    }

    fn require_package(&self) -> StorageResult<&PackageName> {
        self.package
            .as_ref()
            .ok_or_else(|| StorageError::MissingPackageName {
                content: self.key.to_string(),
            })
    }
}

#[async_trait]
impl<K: ContentKey> StorageItem for RelatedItem<K> {
    fn feed_name(&self) -> &str {
        self.object.bucket().name()
    }

    async fn exists(&self) -> StorageResult<bool> {
        self.object.exists().await
    }

    async fn get(&self) -> StorageResult<Option<Bytes>> {
        self.object.open_read().await
    }

    /// Register the reference before the writer is handed out, so a blob
    /// never exists without a reference to it.
    async fn put(&self) -> StorageResult<ObjectWriter> {
        let package = self.require_package()?;
        package.validate()?;
        self.key.validate()?;
        self.object.create_container_if_absent().await?;
        self.index.add(package).await?;
        debug!(content = %self.key, %package, "opening content writer");
        Ok(self.object.open_write())
    }

    /// Drop this package's reference. Returns `true` only when that was the
    /// last reference and the blob was deleted with it.
    async fn delete(&self) -> StorageResult<bool> {
        let package = self.require_package()?;
        self.index.remove(package).await?;
        if !self.index.is_empty().await? {
            debug!(content = %self.key, %package, "content still referenced");
            return Ok(false);
        }
        let deleted = self.object.delete_if_exists().await?;
        if deleted {
            info!(content = %self.key, "deleted unreferenced content");
        }
        Ok(deleted)
    }
}
