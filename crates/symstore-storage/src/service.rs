use std::sync::Arc;

use symstore_backend::{InMemoryObjectBackend, InMemoryTableBackend, ObjectBackend, TableBackend};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::feed::{FeedDeletion, StorageFeed};
use crate::naming::{bucket_name, feed_from_bucket, table_name};
use crate::object::Bucket;
use crate::table::ContentTable;

/// Entry point: hands out feeds over one object store and one table store.
#[derive(Clone)]
pub struct StorageService {
    objects: Arc<dyn ObjectBackend>,
    tables: Arc<dyn TableBackend>,
    config: Arc<StorageConfig>,
}

impl StorageService {
    pub fn new(
        objects: Arc<dyn ObjectBackend>,
        tables: Arc<dyn TableBackend>,
        config: StorageConfig,
    ) -> Self {
        Self {
            objects,
            tables,
            config: Arc::new(config),
        }
    }

    /// A service over fresh in-memory backends with fast polling.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectBackend::new()),
            Arc::new(InMemoryTableBackend::new()),
            StorageConfig::for_tests(),
        )
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The feed called `name`, or the default feed for `None`.
    ///
    /// Only derives names; backing resources are created by the feed's
    /// first write. Fails with `InvalidFeedName` for a name that is not
    /// lower-case.
    pub fn feed(&self, name: Option<&str>) -> StorageResult<StorageFeed> {
        let bucket = bucket_name(name)?;
        let table = table_name(&bucket);
        Ok(StorageFeed::new(
            Bucket::new(Arc::clone(&self.objects), bucket, self.config.bucket_poll.clone()),
            ContentTable::new(Arc::clone(&self.tables), table, &self.config),
            Arc::clone(&self.config),
        ))
    }

    /// Every feed with a bucket, `None` standing for the default feed.
    ///
    /// Buckets without the feed prefix are ignored. A prefixed bucket that
    /// matches neither feed pattern fails the whole listing with
    /// `NamingViolation`.
    pub async fn query_feeds(&self) -> StorageResult<Vec<Option<String>>> {
        let buckets = self.objects.list_buckets().await?;
        let mut feeds = Vec::new();
        for bucket in &buckets {
            match feed_from_bucket(bucket)? {
                Some(feed) => feeds.push(feed),
                None => debug!(%bucket, "skipping non-feed bucket"),
            }
        }
        Ok(feeds)
    }

    pub async fn delete_feed(&self, name: Option<&str>) -> StorageResult<FeedDeletion> {
        self.feed(name)?.delete().await
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("config", &self.config)
            .finish()
    }
}
