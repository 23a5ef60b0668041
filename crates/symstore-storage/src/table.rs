use std::sync::Arc;

use symstore_backend::{
    AttributeFilter, BackendError, ItemKey, Row, TableBackend, TableSchema, TableStatus,
};
use tracing::{debug, info};

use crate::config::{PollConfig, StorageConfig};
use crate::error::StorageResult;
use crate::poll::poll_until;

/// Partition (hash) key attribute of every content table.
pub const PARTITION_ATTRIBUTE: &str = "state";
/// Sort (range) key attribute of every content table.
pub const SORT_ATTRIBUTE: &str = "id";

/// Thin wrapper over one table of the table store.
///
/// Missing tables read as empty: `retrieve` returns `None`, queries return
/// no rows and deletes return `false`.
#[derive(Clone)]
pub struct ContentTable {
    name: String,
    tables: Arc<dyn TableBackend>,
    poll: PollConfig,
    read_capacity: u64,
    write_capacity: u64,
}

impl ContentTable {
    pub fn new(tables: Arc<dyn TableBackend>, name: impl Into<String>, config: &StorageConfig) -> Self {
        Self {
            name: name.into(),
            tables,
            poll: config.table_poll.clone(),
            read_capacity: config.read_capacity,
            write_capacity: config.write_capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A row carrying only the two key attributes.
    pub fn key_row(partition: impl Into<String>, sort: impl Into<String>) -> Row {
        Row::new()
            .with(PARTITION_ATTRIBUTE, partition)
            .with(SORT_ATTRIBUTE, sort)
    }

    fn schema(&self) -> TableSchema {
        TableSchema {
            table_name: self.name.clone(),
            partition_attribute: PARTITION_ATTRIBUTE.into(),
            sort_attribute: SORT_ATTRIBUTE.into(),
            read_capacity: self.read_capacity,
            write_capacity: self.write_capacity,
        }
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        let names = self.tables.list_tables().await?;
        Ok(names.iter().any(|n| *n == self.name))
    }

    /// Create the table unless it exists, then wait until it is active.
    ///
    /// A listed table can still be creating; the wait applies either way.
    pub async fn create_if_absent(&self) -> StorageResult<()> {
        if !self.exists().await? {
            match self.tables.create_table(&self.schema()).await {
                Ok(()) => info!(table = %self.name, "creating table"),
                Err(BackendError::ResourceInUse(_)) => {
                    debug!(table = %self.name, "table creation already under way");
                }
                Err(e) => return Err(e.into()),
            }
        }
        poll_until(&self.poll, &self.name, move || self.is_active()).await
    }

    async fn is_active(&self) -> StorageResult<bool> {
        match self.tables.describe_table(&self.name).await {
            Ok(status) => Ok(status == TableStatus::Active),
            // Not listed yet right after creation.
            Err(BackendError::ResourceNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn retrieve(&self, partition: &str, sort: &str) -> StorageResult<Option<Row>> {
        match self
            .tables
            .get_item(&self.name, &ItemKey::new(partition, sort))
            .await
        {
            Ok(row) => Ok(row),
            Err(BackendError::ResourceNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace the row identified by its key attributes.
    pub async fn upsert(&self, row: Row) -> StorageResult<()> {
        debug!(
            table = %self.name,
            partition = row.get(PARTITION_ATTRIBUTE).unwrap_or_default(),
            sort = row.get(SORT_ATTRIBUTE).unwrap_or_default(),
            "upsert row"
        );
        self.tables.put_item(&self.name, row).await?;
        Ok(())
    }

    pub async fn delete_row_if_exists(&self, partition: &str, sort: &str) -> StorageResult<bool> {
        match self
            .tables
            .delete_item(&self.name, &ItemKey::new(partition, sort))
            .await
        {
            Ok(old) => {
                if old.is_some() {
                    debug!(table = %self.name, partition, sort, "deleted row");
                }
                Ok(old.is_some())
            }
            Err(BackendError::ResourceNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every row of `partition` matching `filter`, across all result pages.
    pub async fn query_partition(
        &self,
        partition: &str,
        filter: Option<&AttributeFilter>,
    ) -> StorageResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let page = match self
                .tables
                .query(&self.name, partition, filter, start.as_deref())
                .await
            {
                Ok(page) => page,
                Err(BackendError::ResourceNotFound(_)) => return Ok(rows),
                Err(e) => return Err(e.into()),
            };
            rows.extend(page.rows);
            match page.last_evaluated {
                Some(next) => start = Some(next),
                None => return Ok(rows),
            }
        }
    }

    pub async fn delete_table_if_exists(&self) -> StorageResult<bool> {
        match self.tables.delete_table(&self.name).await {
            Ok(()) => {
                info!(table = %self.name, "deleted table");
                Ok(true)
            }
            Err(BackendError::ResourceNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for ContentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentTable").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symstore_backend::{InMemoryTableBackend, Operation};

    use crate::error::StorageError;

    fn table_on(backend: &Arc<InMemoryTableBackend>) -> ContentTable {
        ContentTable::new(backend.clone(), "feed-default", &StorageConfig::for_tests())
    }

    #[tokio::test]
    async fn missing_table_reads_as_empty() {
        let backend = Arc::new(InMemoryTableBackend::new());
        let table = table_on(&backend);
        assert!(!table.exists().await.unwrap());
        assert!(table.retrieve("p", "s").await.unwrap().is_none());
        assert!(table.query_partition("p", None).await.unwrap().is_empty());
        assert!(!table.delete_row_if_exists("p", "s").await.unwrap());
        assert!(!table.delete_table_if_exists().await.unwrap());
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let backend = Arc::new(InMemoryTableBackend::new().with_creation_lag(4));
        let table = table_on(&backend);
        table.create_if_absent().await.unwrap();
        assert!(table.exists().await.unwrap());
        table.create_if_absent().await.unwrap();
        assert_eq!(backend.faults().calls(Operation::CreateTable), 1);
    }

    #[tokio::test]
    async fn create_times_out_when_never_active() {
        let backend = Arc::new(InMemoryTableBackend::new().with_creation_lag(1_000));
        let table = table_on(&backend);
        let err = table.create_if_absent().await.unwrap_err();
        assert!(matches!(err, StorageError::PollTimeout { attempts: 20, .. }));
    }

    #[tokio::test]
    async fn upsert_retrieve_delete() {
        let backend = Arc::new(InMemoryTableBackend::new());
        let table = table_on(&backend);
        table.create_if_absent().await.unwrap();

        table
            .upsert(ContentTable::key_row("pkg*current", "a*1.0").with("UserName", "alice"))
            .await
            .unwrap();
        let row = table.retrieve("pkg*current", "a*1.0").await.unwrap().unwrap();
        assert_eq!(row.get("UserName"), Some("alice"));

        table
            .upsert(ContentTable::key_row("pkg*current", "a*1.0").with("UserName", "bob"))
            .await
            .unwrap();
        let row = table.retrieve("pkg*current", "a*1.0").await.unwrap().unwrap();
        assert_eq!(row.get("UserName"), Some("bob"));

        assert!(table.delete_row_if_exists("pkg*current", "a*1.0").await.unwrap());
        assert!(!table.delete_row_if_exists("pkg*current", "a*1.0").await.unwrap());
    }

    #[tokio::test]
    async fn query_hides_pagination() {
        let backend = Arc::new(InMemoryTableBackend::new().with_page_size(3));
        let table = table_on(&backend);
        table.create_if_absent().await.unwrap();
        for i in 0..10 {
            let owner = if i % 2 == 0 { "alice" } else { "bob" };
            table
                .upsert(ContentTable::key_row("pkg*current", format!("p{i:02}*1.0")).with("UserName", owner))
                .await
                .unwrap();
        }
        table
            .upsert(ContentTable::key_row("pkg*retired", "old*1.0"))
            .await
            .unwrap();

        assert_eq!(table.query_partition("pkg*current", None).await.unwrap().len(), 10);
        let alice = AttributeFilter::equals("UserName", "alice");
        assert_eq!(
            table.query_partition("pkg*current", Some(&alice)).await.unwrap().len(),
            5
        );
        assert!(backend.faults().calls(Operation::Query) > 2);
    }

    #[tokio::test]
    async fn backend_failures_propagate() {
        let backend = Arc::new(InMemoryTableBackend::new());
        let table = table_on(&backend);
        table.create_if_absent().await.unwrap();
        backend.faults().fail_next(Operation::GetItem);
        assert!(matches!(
            table.retrieve("p", "s").await,
            Err(StorageError::Backend(BackendError::Injected(Operation::GetItem)))
        ));
    }
}
