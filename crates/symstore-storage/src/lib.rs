//! Feed, package, symbol and source storage for symstore.
//!
//! Maps feeds onto two backing services: an object store holding blobs
//! and a table store holding package metadata and content reference sets.
//! Each feed owns one bucket and one table, both named from the feed name
//! and created lazily on first write.
//!
//! # Key Types
//!
//! - [`StorageService`] -- entry point; derives feeds and lists them
//! - [`StorageFeed`] -- one feed's bucket and table
//! - [`PackageItem`] -- a package blob plus its owner-tracking row
//! - [`RelatedItem`] -- reference-counted shared content ([`SymbolItem`],
//!   [`SourceItem`])
//! - [`StorageItem`] -- exists / get / put / delete shared by both item kinds
//! - [`StorageConfig`] -- capacities, package extension, polling schedules
//!
//! # Design Rules
//!
//! 1. Absence is never an error on read and delete paths.
//! 2. Mutations are ordered sequences of idempotent steps. A failed
//!    operation is retried by running it again.
//! 3. Shared content is deleted only when its last reference is removed,
//!    and a reference is always recorded before the blob is written.
//! 4. Waiting for new resources is bounded; an unready resource surfaces
//!    as [`StorageError::PollTimeout`].
//! 5. Names, keys and paths produced by [`naming`] are persisted format.

pub mod config;
pub mod error;
pub mod feed;
pub mod item;
pub mod naming;
pub mod object;
pub mod package;
pub mod poll;
pub mod related;
pub mod related_item;
pub mod service;
pub mod table;

pub use config::{PollConfig, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use feed::{FeedDeletion, StorageFeed};
pub use item::{ContentKey, StorageItem};
pub use object::{Bucket, ObjectReference, ObjectWriter};
pub use package::{OwnerResolution, PackageItem};
pub use related::RelatedItemIndex;
pub use related_item::RelatedItem;
pub use service::StorageService;
pub use table::ContentTable;

pub use symstore_types::{PackageName, PackageState, SourceName, SymbolName};

/// Shared debug-symbol content.
pub type SymbolItem = RelatedItem<SymbolName>;
/// Shared source-file content.
pub type SourceItem = RelatedItem<SourceName>;
