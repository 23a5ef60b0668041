//! Call journal and fault injection for the in-memory backends.
//!
//! Every in-memory call passes through [`FaultPlan::check`], which records
//! the operation in a journal and fails it if a fault was scheduled. Tests
//! use this to cut a multi-step storage operation at any sub-step boundary
//! and then verify that re-running the operation converges.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::error::{BackendError, BackendResult};

/// One primitive of either backing service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListBuckets,
    BucketExists,
    CreateBucket,
    DeleteBucket,
    ListObjects,
    HeadObject,
    GetObject,
    PutObject,
    DeleteObject,
    CopyObject,
    ListTables,
    CreateTable,
    DescribeTable,
    DeleteTable,
    GetItem,
    PutItem,
    DeleteItem,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListBuckets => "list-buckets",
            Self::BucketExists => "bucket-exists",
            Self::CreateBucket => "create-bucket",
            Self::DeleteBucket => "delete-bucket",
            Self::ListObjects => "list-objects",
            Self::HeadObject => "head-object",
            Self::GetObject => "get-object",
            Self::PutObject => "put-object",
            Self::DeleteObject => "delete-object",
            Self::CopyObject => "copy-object",
            Self::ListTables => "list-tables",
            Self::CreateTable => "create-table",
            Self::DescribeTable => "describe-table",
            Self::DeleteTable => "delete-table",
            Self::GetItem => "get-item",
            Self::PutItem => "put-item",
            Self::DeleteItem => "delete-item",
            Self::Query => "query",
        };
        f.write_str(name)
    }
}

/// Scheduled failures plus a journal of every call seen.
#[derive(Default)]
pub struct FaultPlan {
    /// Operation -> number of calls to let through before failing one.
    pending: Mutex<HashMap<Operation, usize>>,
    journal: Mutex<Vec<Operation>>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call to `op`.
    pub fn fail_next(&self, op: Operation) {
        self.fail_nth(op, 1);
    }

    /// Fail the `n`th upcoming call to `op` (1-based). Earlier calls succeed.
    pub fn fail_nth(&self, op: Operation, n: usize) {
        self.pending
            .lock()
            .expect("fault plan lock poisoned")
            .insert(op, n.saturating_sub(1));
    }

    /// Drop every scheduled fault that has not fired yet.
    pub fn clear(&self) {
        self.pending.lock().expect("fault plan lock poisoned").clear();
    }

    /// Record a call and fail it if a fault is due.
    pub fn check(&self, op: Operation) -> BackendResult<()> {
        self.journal.lock().expect("fault plan lock poisoned").push(op);

        let mut pending = self.pending.lock().expect("fault plan lock poisoned");
        match pending.get_mut(&op) {
            Some(0) => {
                pending.remove(&op);
                tracing::debug!(operation = %op, "injecting backend fault");
                Err(BackendError::Injected(op))
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Every operation checked so far, in call order.
    pub fn journal(&self) -> Vec<Operation> {
        self.journal.lock().expect("fault plan lock poisoned").clone()
    }

    /// Number of recorded calls to `op`.
    pub fn calls(&self, op: Operation) -> usize {
        self.journal
            .lock()
            .expect("fault plan lock poisoned")
            .iter()
            .filter(|seen| **seen == op)
            .count()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().expect("fault plan lock poisoned").clear();
    }
}

impl fmt::Debug for FaultPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.pending.lock().expect("fault plan lock poisoned").len();
        f.debug_struct("FaultPlan")
            .field("pending_faults", &pending)
            .finish()
    }
}
