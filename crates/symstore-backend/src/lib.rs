//! Backing-service contracts for symstore.
//!
//! The storage layer talks to two remote services through the narrow
//! primitives defined here:
//!
//! - [`ObjectBackend`] -- bucket-style blob storage addressed by bucket + key.
//!   Eventually consistent on bucket creation, strongly consistent on
//!   individual object get/put/delete.
//! - [`TableBackend`] -- structured rows addressed by partition + sort key,
//!   with paged per-partition queries and asynchronous table creation.
//!
//! # Backends
//!
//! - [`InMemoryObjectBackend`] / [`InMemoryTableBackend`] -- map-based
//!   services for tests and embedding. Both can simulate creation lag and
//!   small page sizes, and both accept a [`FaultPlan`] for failing a chosen
//!   call.
//!
//! # Design Rules
//!
//! 1. Not-found conditions are reported as typed errors, never as panics.
//!    Callers decide which of them mean "absent".
//! 2. Pagination is visible at this level; the storage layer hides it.
//! 3. Backends never interpret object contents or non-key row attributes.

pub mod error;
pub mod fault;
pub mod object_memory;
pub mod table_memory;
pub mod traits;
pub mod types;

pub use error::{BackendError, BackendResult};
pub use fault::{FaultPlan, Operation};
pub use object_memory::InMemoryObjectBackend;
pub use table_memory::InMemoryTableBackend;
pub use traits::{ObjectBackend, TableBackend};
pub use types::{
    AttributeFilter, ItemKey, ObjectMeta, ObjectPage, QueryPage, Row, TableSchema, TableStatus,
};
