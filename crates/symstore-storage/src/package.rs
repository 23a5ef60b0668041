//! Package blobs with owner-tracking metadata rows.
//!
//! A package lives in two places: a row in the feed table keyed by
//! `pkg*{state}` / `{id}*{version}` recording the owner, and a blob in the
//! feed bucket whose path embeds that owner. The two services share no
//! transaction, so every mutating operation here is an ordered sequence of
//! idempotent steps that can be re-run from the start after a failure.

use async_trait::async_trait;
use bytes::Bytes;
use symstore_backend::Row;
use symstore_types::{PackageName, PackageState};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::item::StorageItem;
use crate::naming::{package_partition_key, package_path, package_sort_key};
use crate::object::{Bucket, ObjectWriter};
use crate::table::{ContentTable, PARTITION_ATTRIBUTE, SORT_ATTRIBUTE};

/// Row attribute holding the owning user.
pub const OWNER_ATTRIBUTE: &str = "UserName";

/// Outcome of comparing the requested owner with the recorded one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerResolution {
    /// The owner whose path holds the blob.
    Resolved(String),
    /// No owner requested and none recorded.
    Unknown,
    /// The requested owner differs from the recorded owner.
    Mismatch { recorded: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Relocation {
    Move,
    Copy,
}

/// One package identity inside a feed, seen on behalf of an optional owner.
///
/// Construction performs no I/O. Obtain instances through
/// [`StorageFeed::package`](crate::StorageFeed::package).
#[derive(Clone, Debug)]
pub struct PackageItem {
    bucket: Bucket,
    table: ContentTable,
    state: PackageState,
    name: PackageName,
    owner: Option<String>,
    extension: String,
}

impl PackageItem {
    pub(crate) fn new(
        bucket: Bucket,
        table: ContentTable,
        state: PackageState,
        name: PackageName,
        owner: Option<String>,
        extension: String,
    ) -> Self {
        Self {
            bucket,
            table,
            state,
            name,
            owner,
            extension,
        }
    }

    pub fn state(&self) -> &PackageState {
        &self.state
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// The owner this item was requested for, if any.
    pub fn requested_owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn partition_key(&self) -> String {
        package_partition_key(&self.state)
    }

    fn sort_key(&self) -> String {
        package_sort_key(&self.name)
    }

    /// Object path of this package's blob under `owner`.
    pub fn path_for(&self, owner: &str) -> String {
        package_path(&self.state, owner, &self.name, &self.extension)
    }

    /// Same feed and requested owner, different state and name.
    fn sibling(&self, state: PackageState, name: PackageName) -> Self {
        Self {
            state,
            name,
            ..self.clone()
        }
    }

    async fn lookup(&self) -> StorageResult<(Option<Row>, OwnerResolution)> {
        let row = self
            .table
            .retrieve(&self.partition_key(), &self.sort_key())
            .await?;
        let recorded = row
            .as_ref()
            .and_then(|r| r.get(OWNER_ATTRIBUTE))
            .map(str::to_string);
        let resolution = match (&self.owner, recorded) {
            (None, Some(recorded)) => OwnerResolution::Resolved(recorded),
            (None, None) => OwnerResolution::Unknown,
            (Some(requested), Some(recorded)) if *requested != recorded => {
                OwnerResolution::Mismatch { recorded }
            }
            (Some(requested), _) => OwnerResolution::Resolved(requested.clone()),
        };
        Ok((row, resolution))
    }

    /// Compare the requested owner with the owner recorded in the table.
    pub async fn resolve_owner(&self) -> StorageResult<OwnerResolution> {
        Ok(self.lookup().await?.1)
    }

    /// The effective owner: the recorded owner when none was requested, the
    /// requested owner when it matches or nothing is recorded, `None` on a
    /// mismatch.
    pub async fn owner(&self) -> StorageResult<Option<String>> {
        match self.resolve_owner().await? {
            OwnerResolution::Resolved(owner) => Ok(Some(owner)),
            OwnerResolution::Unknown | OwnerResolution::Mismatch { .. } => Ok(None),
        }
    }

    async fn blob_listed(&self, owner: &str) -> StorageResult<bool> {
        if !self.bucket.exists().await? {
            return Ok(false);
        }
        self.bucket.contains_listed(&self.path_for(owner)).await
    }

    /// Move this package to `state` / `name`.
    ///
    /// Returns the item at its new location, or `None` when this package
    /// does not exist for the requested owner. Not atomic: the row moves
    /// before the blob, and a failure in between is repaired by calling
    /// `move_to` again with an explicit owner.
    pub async fn move_to(
        &self,
        state: PackageState,
        name: PackageName,
    ) -> StorageResult<Option<PackageItem>> {
        self.relocate(state, name, Relocation::Move).await
    }

    /// Copy this package to `state` / `name`, keeping the source.
    pub async fn copy_to(
        &self,
        state: PackageState,
        name: PackageName,
    ) -> StorageResult<Option<PackageItem>> {
        self.relocate(state, name, Relocation::Copy).await
    }

    async fn relocate(
        &self,
        state: PackageState,
        name: PackageName,
        mode: Relocation,
    ) -> StorageResult<Option<PackageItem>> {
        name.validate()?;
        let (row, resolution) = self.lookup().await?;
        let OwnerResolution::Resolved(owner) = resolution else {
            return Ok(None);
        };
        if !self.blob_listed(&owner).await? {
            return Ok(None);
        }

        let target = self.sibling(state, name);
        if target.partition_key() == self.partition_key() && target.name == self.name {
            return Ok(Some(target));
        }

        let mut row = match row {
            Some(row) => row,
            None => {
                warn!(
                    package = %self.name,
                    state = %self.state,
                    %owner,
                    "package row missing; rebuilding it from the stored blob"
                );
                self.table.create_if_absent().await?;
                Row::new()
            }
        };
        row.set(PARTITION_ATTRIBUTE, target.partition_key());
        row.set(SORT_ATTRIBUTE, target.sort_key());
        row.set(OWNER_ATTRIBUTE, owner.clone());
        self.table.upsert(row).await?;

        let source = self.path_for(&owner);
        let destination = target.path_for(&owner);
        match mode {
            Relocation::Move => {
                self.table
                    .delete_row_if_exists(&self.partition_key(), &self.sort_key())
                    .await?;
                self.bucket.move_object(&source, &destination).await?;
            }
            Relocation::Copy => self.bucket.copy_object(&source, &destination).await?,
        }
        info!(
            from = %source,
            to = %destination,
            mode = ?mode,
            "relocated package"
        );
        Ok(Some(target))
    }
}

#[async_trait]
impl StorageItem for PackageItem {
    fn feed_name(&self) -> &str {
        self.bucket.name()
    }

    /// True only when the bucket exists and a listing confirms the blob at
    /// the resolved owner's path.
    async fn exists(&self) -> StorageResult<bool> {
        match self.resolve_owner().await? {
            OwnerResolution::Resolved(owner) => self.blob_listed(&owner).await,
            OwnerResolution::Unknown | OwnerResolution::Mismatch { .. } => Ok(false),
        }
    }

    async fn get(&self) -> StorageResult<Option<Bytes>> {
        match self.resolve_owner().await? {
            OwnerResolution::Resolved(owner) => {
                self.bucket.object(self.path_for(&owner)).open_read().await
            }
            OwnerResolution::Unknown | OwnerResolution::Mismatch { .. } => Ok(None),
        }
    }

    /// Reconcile ownership, create the backing resources and record the
    /// row, then hand out a writer at the owner's path.
    async fn put(&self) -> StorageResult<ObjectWriter> {
        let owner = self.owner.clone().ok_or_else(|| StorageError::MissingOwner {
            package: self.name.clone(),
        })?;
        self.name.validate()?;
        let partition = self.partition_key();
        let sort = self.sort_key();

        let existing = self.table.retrieve(&partition, &sort).await?;
        let row = match existing {
            Some(mut row) => {
                if let Some(previous) = row.get(OWNER_ATTRIBUTE).filter(|p| *p != owner) {
                    let previous = previous.to_string();
                    self.bucket
                        .delete_object_if_exists(&self.path_for(&previous))
                        .await?;
                    info!(
                        package = %self.name,
                        state = %self.state,
                        from = %previous,
                        to = %owner,
                        "transferring package ownership"
                    );
                }
                row.set(OWNER_ATTRIBUTE, owner.clone());
                row
            }
            None => ContentTable::key_row(partition, sort).with(OWNER_ATTRIBUTE, owner.clone()),
        };

        self.bucket.create_if_absent().await?;
        self.table.create_if_absent().await?;
        self.table.upsert(row).await?;
        debug!(package = %self.name, state = %self.state, %owner, "opening package writer");
        Ok(self.bucket.object(self.path_for(&owner)).open_write())
    }

    /// Remove the blob and the row. A requested owner that differs from
    /// the recorded one is refused with [`StorageError::OwnershipMismatch`].
    async fn delete(&self) -> StorageResult<bool> {
        let (row, resolution) = self.lookup().await?;
        let blob_removed = match resolution {
            OwnerResolution::Resolved(owner) => {
                self.bucket
                    .delete_object_if_exists(&self.path_for(&owner))
                    .await?
            }
            OwnerResolution::Unknown => false,
            OwnerResolution::Mismatch { recorded } => {
                warn!(package = %self.name, %recorded, "refusing delete for another owner");
                return Err(StorageError::OwnershipMismatch {
                    package: self.name.clone(),
                    requested: self.owner.clone().unwrap_or_default(),
                });
            }
        };
        let row_removed = match row {
            Some(_) => {
                self.table
                    .delete_row_if_exists(&self.partition_key(), &self.sort_key())
                    .await?
            }
            None => false,
        };
        if blob_removed != row_removed {
            warn!(
                package = %self.name,
                state = %self.state,
                blob_removed,
                row_removed,
                "package row and blob were out of step"
            );
        }
        Ok(blob_removed || row_removed)
    }
}
