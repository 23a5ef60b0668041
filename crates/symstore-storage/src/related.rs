//! Reference sets for shared content.
//!
//! A symbol or source blob can be shared by many packages. Each content key
//! owns one table partition holding a row per referencing package; the blob
//! lives exactly as long as that partition is non-empty.

use std::collections::BTreeSet;

use symstore_types::PackageName;
use tracing::debug;

use crate::error::StorageResult;
use crate::naming::{package_sort_key, parse_package_sort_key};
use crate::table::{ContentTable, SORT_ATTRIBUTE};

/// The set of packages referencing one content key.
#[derive(Clone, Debug)]
pub struct RelatedItemIndex {
    table: ContentTable,
    partition: String,
}

impl RelatedItemIndex {
    pub fn new(table: ContentTable, partition: impl Into<String>) -> Self {
        Self {
            table,
            partition: partition.into(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition
    }

    /// Register a reference. Creates the table on first use; re-adding an
    /// existing reference rewrites the same row. A name whose sort key
    /// would not decode is refused with
    /// [`StorageError::InvalidName`](crate::StorageError::InvalidName).
    pub async fn add(&self, package: &PackageName) -> StorageResult<()> {
        package.validate()?;
        self.table.create_if_absent().await?;
        self.table
            .upsert(ContentTable::key_row(&self.partition, package_sort_key(package)))
            .await?;
        debug!(content = %self.partition, %package, "added reference");
        Ok(())
    }

    /// Drop a reference. Returns whether it was present.
    pub async fn remove(&self, package: &PackageName) -> StorageResult<bool> {
        let removed = self
            .table
            .delete_row_if_exists(&self.partition, &package_sort_key(package))
            .await?;
        debug!(content = %self.partition, %package, removed, "removed reference");
        Ok(removed)
    }

    /// Every package currently referencing this content.
    pub async fn list(&self) -> StorageResult<BTreeSet<PackageName>> {
        self.table
            .query_partition(&self.partition, None)
            .await?
            .iter()
            .filter_map(|row| row.get(SORT_ATTRIBUTE))
            .map(parse_package_sort_key)
            .collect()
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.list().await?.is_empty())
    }
}
