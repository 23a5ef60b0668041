use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BackendError, BackendResult};
use crate::fault::{FaultPlan, Operation};
use crate::traits::ObjectBackend;
use crate::types::{ObjectMeta, ObjectPage};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Default)]
struct MemBucket {
    objects: BTreeMap<String, Bytes>,
    /// Remaining `bucket_exists` probes that still report the bucket absent.
    invisible_for: usize,
}

/// In-memory, map-based object store.
///
/// Intended for tests and embedding. Buckets are held behind a `RwLock`;
/// no lock is held across an await point. [`with_creation_lag`] makes new
/// buckets invisible to the first N existence probes to exercise
/// eventual-consistency polling.
///
/// [`with_creation_lag`]: InMemoryObjectBackend::with_creation_lag
pub struct InMemoryObjectBackend {
    buckets: RwLock<HashMap<String, MemBucket>>,
    page_size: usize,
    creation_lag: usize,
    faults: Arc<FaultPlan>,
}

impl InMemoryObjectBackend {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            creation_lag: 0,
            faults: Arc::new(FaultPlan::new()),
        }
    }

    /// Maximum keys per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of `bucket_exists` probes a new bucket stays invisible for.
    pub fn with_creation_lag(mut self, probes: usize) -> Self {
        self.creation_lag = probes;
        self
    }

    /// Share a fault plan, e.g. with an [`InMemoryTableBackend`] so one
    /// journal covers both services.
    ///
    /// [`InMemoryTableBackend`]: crate::InMemoryTableBackend
    pub fn with_faults(mut self, faults: Arc<FaultPlan>) -> Self {
        self.faults = faults;
        self
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        &self.faults
    }

    /// Number of objects in `bucket` (0 if absent).
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map_or(0, |b| b.objects.len())
    }

    /// Direct key lookup, bypassing faults and the journal.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .is_some_and(|b| b.objects.contains_key(key))
    }

    fn no_such_key(bucket: &str, key: &str) -> BackendError {
        BackendError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl Default for InMemoryObjectBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryObjectBackend {
    async fn list_buckets(&self) -> BackendResult<Vec<String>> {
        self.faults.check(Operation::ListBuckets)?;
        let map = self.buckets.read().expect("lock poisoned");
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        self.faults.check(Operation::BucketExists)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        Ok(match map.get_mut(bucket) {
            Some(b) if b.invisible_for > 0 => {
                b.invisible_for -= 1;
                false
            }
            Some(_) => true,
            None => false,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.faults.check(Operation::CreateBucket)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        if map.contains_key(bucket) {
            return Err(BackendError::BucketAlreadyOwnedByYou(bucket.to_string()));
        }
        map.insert(
            bucket.to_string(),
            MemBucket {
                objects: BTreeMap::new(),
                invisible_for: self.creation_lag,
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.faults.check(Operation::DeleteBucket)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        match map.get(bucket) {
            None => Err(BackendError::NoSuchBucket(bucket.to_string())),
            Some(b) if !b.objects.is_empty() => Err(BackendError::BucketNotEmpty(bucket.to_string())),
            Some(_) => {
                map.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> BackendResult<ObjectPage> {
        self.faults.check(Operation::ListObjects)?;
        let map = self.buckets.read().expect("lock poisoned");
        let b = map
            .get(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;

        let lower = match continuation {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matching = b
            .objects
            .range((lower, Bound::Unbounded))
            .map(|(k, _)| k)
            .skip_while(|k| k.as_str() < prefix)
            .take_while(|k| k.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let continuation = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };
        Ok(ObjectPage { keys, continuation })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectMeta> {
        self.faults.check(Operation::HeadObject)?;
        let map = self.buckets.read().expect("lock poisoned");
        let b = map
            .get(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;
        let body = b.objects.get(key).ok_or_else(|| Self::no_such_key(bucket, key))?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<Bytes> {
        self.faults.check(Operation::GetObject)?;
        let map = self.buckets.read().expect("lock poisoned");
        let b = map
            .get(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;
        b.objects
            .get(key)
            .cloned()
            .ok_or_else(|| Self::no_such_key(bucket, key))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<()> {
        self.faults.check(Operation::PutObject)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        let b = map
            .get_mut(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;
        b.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.faults.check(Operation::DeleteObject)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        let b = map
            .get_mut(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;
        b.objects.remove(key);
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source: &str, destination: &str) -> BackendResult<()> {
        self.faults.check(Operation::CopyObject)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        let b = map
            .get_mut(bucket)
            .ok_or_else(|| BackendError::NoSuchBucket(bucket.to_string()))?;
        let body = b
            .objects
            .get(source)
            .cloned()
            .ok_or_else(|| Self::no_such_key(bucket, source))?;
        b.objects.insert(destination.to_string(), body);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryObjectBackend")
            .field("bucket_count", &count)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend_with_bucket(name: &str) -> InMemoryObjectBackend {
        let backend = InMemoryObjectBackend::new();
        backend.create_bucket(name).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn put_and_get_object() {
        let backend = backend_with_bucket("b").await;
        backend
            .put_object("b", "pdb/a/1", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(backend.get_object("b", "pdb/a/1").await.unwrap(), "hello");
        assert_eq!(backend.head_object("b", "pdb/a/1").await.unwrap().size, 5);
    }

    #[tokio::test]
    async fn missing_bucket_and_key_are_distinct() {
        let backend = backend_with_bucket("b").await;
        assert!(matches!(
            backend.get_object("nope", "k").await,
            Err(BackendError::NoSuchBucket(_))
        ));
        assert!(matches!(
            backend.get_object("b", "k").await,
            Err(BackendError::NoSuchKey { .. })
        ));
    }

    #[tokio::test]
    async fn create_twice_reports_already_owned() {
        let backend = backend_with_bucket("b").await;
        assert!(matches!(
            backend.create_bucket("b").await,
            Err(BackendError::BucketAlreadyOwnedByYou(_))
        ));
    }

    #[tokio::test]
    async fn creation_lag_hides_new_bucket() {
        let backend = InMemoryObjectBackend::new().with_creation_lag(2);
        backend.create_bucket("b").await.unwrap();
        assert!(!backend.bucket_exists("b").await.unwrap());
        assert!(!backend.bucket_exists("b").await.unwrap());
        assert!(backend.bucket_exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn delete_requires_empty_bucket() {
        let backend = backend_with_bucket("b").await;
        backend.put_object("b", "k", Bytes::new()).await.unwrap();
        assert!(matches!(
            backend.delete_bucket("b").await,
            Err(BackendError::BucketNotEmpty(_))
        ));
        backend.delete_object("b", "k").await.unwrap();
        backend.delete_bucket("b").await.unwrap();
        assert!(matches!(
            backend.delete_bucket("b").await,
            Err(BackendError::NoSuchBucket(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_paged_and_prefix_scoped() {
        let backend = InMemoryObjectBackend::new().with_page_size(2);
        backend.create_bucket("b").await.unwrap();
        for key in ["a/1", "b/1", "b/2", "b/3", "c/1"] {
            backend.put_object("b", key, Bytes::new()).await.unwrap();
        }

        let first = backend.list_objects("b", "b/", None).await.unwrap();
        assert_eq!(first.keys, vec!["b/1", "b/2"]);
        let token = first.continuation.expect("more pages");
        let second = backend.list_objects("b", "b/", Some(&token)).await.unwrap();
        assert_eq!(second.keys, vec!["b/3"]);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn exact_page_boundary_has_no_continuation() {
        let backend = InMemoryObjectBackend::new().with_page_size(2);
        backend.create_bucket("b").await.unwrap();
        backend.put_object("b", "x/1", Bytes::new()).await.unwrap();
        backend.put_object("b", "x/2", Bytes::new()).await.unwrap();
        let page = backend.list_objects("b", "", None).await.unwrap();
        assert_eq!(page.keys.len(), 2);
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn copy_keeps_source() {
        let backend = backend_with_bucket("b").await;
        backend
            .put_object("b", "src", Bytes::from_static(b"data"))
            .await
            .unwrap();
        backend.copy_object("b", "src", "dst").await.unwrap();
        assert!(backend.contains("b", "src"));
        assert_eq!(backend.get_object("b", "dst").await.unwrap(), "data");
        assert!(backend.copy_object("b", "missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn injected_fault_is_reported() {
        let backend = backend_with_bucket("b").await;
        backend.faults().fail_next(Operation::PutObject);
        assert!(matches!(
            backend.put_object("b", "k", Bytes::new()).await,
            Err(BackendError::Injected(Operation::PutObject))
        ));
        assert_eq!(backend.object_count("b"), 0);
    }
}
