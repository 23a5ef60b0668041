//! Object-store access: one feed bucket and references to keys inside it.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use symstore_backend::{BackendError, ObjectBackend};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::StorageResult;
use crate::poll::poll_until;

/// One bucket of the object store.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    objects: Arc<dyn ObjectBackend>,
    poll: PollConfig,
}

impl Bucket {
    /// Handle on bucket `name`. Performs no I/O.
    pub fn new(objects: Arc<dyn ObjectBackend>, name: impl Into<String>, poll: PollConfig) -> Self {
        Self {
            name: name.into(),
            objects,
            poll,
        }
    }

    /// Bucket name as given to the backend.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A reference to `key` inside this bucket. No I/O.
    pub fn object(&self, key: impl Into<String>) -> ObjectReference {
        ObjectReference {
            bucket: self.clone(),
            key: key.into(),
        }
    }

    /// Whether the bucket currently exists.
    pub async fn exists(&self) -> StorageResult<bool> {
        Ok(self.objects.bucket_exists(&self.name).await?)
    }

    /// Create the bucket unless it exists, then wait until it is visible.
    ///
    /// A concurrent or earlier creation by us (`BucketAlreadyOwnedByYou`)
    /// counts as success.
    pub async fn create_if_absent(&self) -> StorageResult<()> {
        if self.exists().await? {
            return Ok(());
        }
        match self.objects.create_bucket(&self.name).await {
            Ok(()) => info!(bucket = %self.name, "created bucket"),
            Err(BackendError::BucketAlreadyOwnedByYou(_)) => {
                debug!(bucket = %self.name, "bucket already owned");
            }
            Err(e) => return Err(e.into()),
        }
        poll_until(&self.poll, &self.name, move || self.exists()).await
    }

    /// Delete every object and then the bucket itself.
    pub async fn delete_if_exists(&self) -> StorageResult<bool> {
        let keys = match self.list_all("").await {
            Ok(keys) => keys,
            Err(BackendError::NoSuchBucket(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for key in &keys {
            self.objects.delete_object(&self.name, key).await?;
        }
        match self.objects.delete_bucket(&self.name).await {
            Ok(()) => {
                info!(bucket = %self.name, objects = keys.len(), "deleted bucket");
                Ok(true)
            }
            Err(BackendError::NoSuchBucket(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every key starting with `prefix`, across all listing pages. A missing
    /// bucket lists as empty.
    pub async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        match self.list_all(prefix).await {
            Ok(keys) => Ok(keys),
            Err(BackendError::NoSuchBucket(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .objects
                .list_objects(&self.name, prefix, continuation.as_deref())
                .await?;
            keys.extend(page.keys);
            match page.continuation {
                Some(next) => continuation = Some(next),
                None => return Ok(keys),
            }
        }
    }

    /// Whether `key` shows up in a listing of its own prefix.
    ///
    /// This is the object-store confirmation used by package existence
    /// checks, independent of any metadata row.
    pub async fn contains_listed(&self, key: &str) -> StorageResult<bool> {
        Ok(self.list_keys(key).await?.iter().any(|k| k == key))
    }

    pub async fn delete_object_if_exists(&self, key: &str) -> StorageResult<bool> {
        self.object(key).delete_if_exists().await
    }

    pub async fn copy_object(&self, source: &str, destination: &str) -> StorageResult<()> {
        self.objects
            .copy_object(&self.name, source, destination)
            .await?;
        debug!(bucket = %self.name, source, destination, "copied object");
        Ok(())
    }

    /// Copy, then delete the source once the copy has succeeded. Returns
    /// whether the source was removed.
    pub async fn move_object(&self, source: &str, destination: &str) -> StorageResult<bool> {
        self.copy_object(source, destination).await?;
        self.delete_object_if_exists(source).await
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}

/// Handle to one object: bucket + key.
#[derive(Clone, Debug)]
pub struct ObjectReference {
    bucket: Bucket,
    key: String,
}

impl ObjectReference {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Metadata probe. A missing bucket or key means `false`.
    pub async fn exists(&self) -> StorageResult<bool> {
        match self
            .bucket
            .objects
            .head_object(&self.bucket.name, &self.key)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_missing_object() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Object content, or `None` when the object or its bucket is absent.
    pub async fn open_read(&self) -> StorageResult<Option<Bytes>> {
        match self
            .bucket
            .objects
            .get_object(&self.bucket.name, &self.key)
            .await
        {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.is_missing_object() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// A local buffer that is uploaded to this key on [`ObjectWriter::commit`].
    pub fn open_write(&self) -> ObjectWriter {
        ObjectWriter {
            objects: Arc::clone(&self.bucket.objects),
            bucket: self.bucket.name.clone(),
            key: self.key.clone(),
            buffer: Vec::new(),
            committed: false,
        }
    }

    pub async fn delete_if_exists(&self) -> StorageResult<bool> {
        if !self.exists().await? {
            return Ok(false);
        }
        match self
            .bucket
            .objects
            .delete_object(&self.bucket.name, &self.key)
            .await
        {
            Ok(()) => {
                debug!(bucket = %self.bucket.name, key = %self.key, "deleted object");
                Ok(true)
            }
            Err(e) if e.is_missing_object() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure the bucket holding this object exists and is visible.
    pub async fn create_container_if_absent(&self) -> StorageResult<()> {
        self.bucket.create_if_absent().await
    }
}

/// Buffered object upload, committed on [`commit`](ObjectWriter::commit).
///
/// Content is only sent to the object store by `commit`. A writer dropped
/// without committing persists nothing.
pub struct ObjectWriter {
    objects: Arc<dyn ObjectBackend>,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
    committed: bool,
}

impl ObjectWriter {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Upload the buffered content, replacing any existing object.
    pub async fn commit(mut self) -> StorageResult<()> {
        self.committed = true;
        let body = Bytes::from(std::mem::take(&mut self.buffer));
        let size = body.len();
        self.objects.put_object(&self.bucket, &self.key, body).await?;
        debug!(bucket = %self.bucket, key = %self.key, size, "committed object");
        Ok(())
    }
}

impl io::Write for ObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncWrite for ObjectWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.get_mut().write_bytes(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Drop for ObjectWriter {
    fn drop(&mut self) {
        if !self.committed {
            warn!(
                bucket = %self.bucket,
                key = %self.key,
                buffered = self.buffer.len(),
                "object writer dropped without commit; nothing was stored"
            );
        }
    }
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
