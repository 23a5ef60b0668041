//! One feed: a bucket and a table holding packages, symbols and sources.

use std::sync::Arc;

use symstore_backend::AttributeFilter;
use symstore_types::{PackageName, PackageState, SourceName, SymbolName};
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::item::ContentKey;
use crate::naming::{package_partition_key, parse_package_sort_key, strip_internal_prefix};
use crate::object::Bucket;
use crate::package::{PackageItem, OWNER_ATTRIBUTE};
use crate::related::RelatedItemIndex;
use crate::related_item::RelatedItem;
use crate::table::{ContentTable, SORT_ATTRIBUTE};

/// What [`StorageFeed::delete`] found and removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedDeletion {
    pub table_existed: bool,
    pub bucket_existed: bool,
}

impl FeedDeletion {
    /// `false` when only one of the two backing resources was present.
    pub fn is_consistent(&self) -> bool {
        self.table_existed == self.bucket_existed
    }

    /// Whether anything was deleted.
    pub fn any(&self) -> bool {
        self.table_existed || self.bucket_existed
    }
}

/// A feed's view of the backing services.
///
/// Packages, symbols and sources share one bucket and one table. Nothing is
/// created until the first write.
#[derive(Clone, Debug)]
pub struct StorageFeed {
    bucket: Bucket,
    table: ContentTable,
    config: Arc<StorageConfig>,
}

impl StorageFeed {
    pub(crate) fn new(bucket: Bucket, table: ContentTable, config: Arc<StorageConfig>) -> Self {
        Self {
            bucket,
            table,
            config,
        }
    }

    /// The backing bucket name.
    pub fn name(&self) -> &str {
        self.bucket.name()
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    pub fn package(
        &self,
        owner: Option<&str>,
        state: PackageState,
        name: PackageName,
    ) -> PackageItem {
        PackageItem::new(
            self.bucket.clone(),
            self.table.clone(),
            state,
            name,
            owner.map(str::to_string),
            self.config.package_extension.clone(),
        )
    }

    pub fn symbol(&self, package: Option<PackageName>, name: SymbolName) -> RelatedItem<SymbolName> {
        self.related(package, name)
    }

    pub fn source(&self, package: Option<PackageName>, name: SourceName) -> RelatedItem<SourceName> {
        self.related(package, name)
    }

    fn related<K: ContentKey>(&self, package: Option<PackageName>, key: K) -> RelatedItem<K> {
        let index = RelatedItemIndex::new(self.table.clone(), key.partition_key());
        let object = self.bucket.object(key.object_path());
        RelatedItem::new(package, key, index, object)
    }

    /// Every package in `state`.
    pub async fn query_packages(&self, state: &PackageState) -> StorageResult<Vec<PackageName>> {
        self.query(state, None).await
    }

    /// Every package in `state` recorded for `owner`.
    pub async fn query_packages_by_owner(
        &self,
        owner: &str,
        state: &PackageState,
    ) -> StorageResult<Vec<PackageName>> {
        let filter = AttributeFilter::equals(OWNER_ATTRIBUTE, owner);
        self.query(state, Some(&filter)).await
    }

    /// Bounded slice of a package query.
    pub async fn query_packages_page(
        &self,
        _owner: Option<&str>,
        _state: &PackageState,
        _id_prefix: &str,
        _skip: usize,
        _take: usize,
    ) -> StorageResult<Vec<PackageName>> {
        Err(StorageError::NotImplemented("paged package queries"))
    }

    async fn query(
        &self,
        state: &PackageState,
        filter: Option<&AttributeFilter>,
    ) -> StorageResult<Vec<PackageName>> {
        self.table
            .query_partition(&package_partition_key(state), filter)
            .await?
            .iter()
            .filter_map(|row| row.get(SORT_ATTRIBUTE))
            .map(parse_package_sort_key)
            .collect()
    }

    /// Raw object keys with their leading two segments removed. For
    /// debugging only.
    pub async fn query_internals(&self) -> StorageResult<Vec<String>> {
        let keys = self.bucket.list_keys("").await?;
        Ok(keys.iter().map(|k| strip_internal_prefix(k)).collect())
    }

    /// Delete the table, then the bucket with everything in it.
    ///
    /// Finding only one of the two is reported through
    /// [`FeedDeletion::is_consistent`] and logged as a warning.
    pub async fn delete(&self) -> StorageResult<FeedDeletion> {
        let table_existed = self.table.delete_table_if_exists().await?;
        let bucket_existed = self.bucket.delete_if_exists().await?;
        let outcome = FeedDeletion {
            table_existed,
            bucket_existed,
        };
        if outcome.is_consistent() {
            info!(feed = %self.name(), deleted = outcome.any(), "deleted feed");
        } else {
            warn!(
                feed = %self.name(),
                table_existed,
                bucket_existed,
                "feed table and bucket were out of step"
            );
        }
        Ok(outcome)
    }
}
