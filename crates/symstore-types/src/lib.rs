//! Domain identifiers for symstore.
//!
//! This crate holds the small set of names that the storage layer maps onto
//! backing services. None of these types know anything about buckets, tables
//! or key encodings; that lives in `symstore-storage`.
//!
//! # Key Types
//!
//! - [`PackageName`] -- `{id, version}` identity of a package, independent of
//!   state or owner
//! - [`PackageState`] -- opaque lifecycle tag supplied by feed policy
//! - [`SymbolName`] -- content key of a debug symbol blob
//! - [`SourceName`] -- content key of a source file blob

pub mod content;
pub mod error;
pub mod package;

pub use content::{SourceName, SymbolName};
pub use error::TypeError;
pub use package::{PackageName, PackageState};
