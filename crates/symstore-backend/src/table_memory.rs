use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};
use crate::fault::{FaultPlan, Operation};
use crate::traits::TableBackend;
use crate::types::{AttributeFilter, ItemKey, QueryPage, Row, TableSchema, TableStatus};

const DEFAULT_PAGE_SIZE: usize = 100;

struct MemTable {
    schema: TableSchema,
    /// Remaining `describe_table` calls that still report `Creating`.
    creating_for: usize,
    rows: BTreeMap<(String, String), Row>,
}

impl MemTable {
    fn is_active(&self) -> bool {
        self.creating_for == 0
    }
}

/// In-memory table store.
///
/// Tables start out `Creating` for a configurable number of
/// `describe_table` calls (zero by default: a new table still needs one
/// describe to turn active). Item operations on a table that is not active
/// fail with `ResourceNotFound`, matching the remote service.
pub struct InMemoryTableBackend {
    tables: RwLock<HashMap<String, MemTable>>,
    page_size: usize,
    creation_lag: usize,
    faults: Arc<FaultPlan>,
}

impl InMemoryTableBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            creation_lag: 0,
            faults: Arc::new(FaultPlan::new()),
        }
    }

    /// Maximum rows examined per query page (before filtering).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of extra `describe_table` calls a new table stays `Creating`.
    pub fn with_creation_lag(mut self, describes: usize) -> Self {
        self.creation_lag = describes;
        self
    }

    pub fn with_faults(mut self, faults: Arc<FaultPlan>) -> Self {
        self.faults = faults;
        self
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        &self.faults
    }

    /// Number of rows in `table` (0 if absent).
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Direct row lookup, bypassing faults, activity, and the journal.
    pub fn peek(&self, table: &str, key: &ItemKey) -> Option<Row> {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(table)?
            .rows
            .get(&(key.partition.clone(), key.sort.clone()))
            .cloned()
    }

    fn not_found(table: &str) -> BackendError {
        BackendError::ResourceNotFound(table.to_string())
    }
}

impl Default for InMemoryTableBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn active<'a>(map: &'a HashMap<String, MemTable>, table: &str) -> BackendResult<&'a MemTable> {
    map.get(table)
        .filter(|t| t.is_active())
        .ok_or_else(|| InMemoryTableBackend::not_found(table))
}

fn active_mut<'a>(
    map: &'a mut HashMap<String, MemTable>,
    table: &str,
) -> BackendResult<&'a mut MemTable> {
    map.get_mut(table)
        .filter(|t| t.is_active())
        .ok_or_else(|| InMemoryTableBackend::not_found(table))
}

#[async_trait]
impl TableBackend for InMemoryTableBackend {
    async fn list_tables(&self) -> BackendResult<Vec<String>> {
        self.faults.check(Operation::ListTables)?;
        let map = self.tables.read().expect("lock poisoned");
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_table(&self, schema: &TableSchema) -> BackendResult<()> {
        self.faults.check(Operation::CreateTable)?;
        let mut map = self.tables.write().expect("lock poisoned");
        if map.contains_key(&schema.table_name) {
            return Err(BackendError::ResourceInUse(schema.table_name.clone()));
        }
        map.insert(
            schema.table_name.clone(),
            MemTable {
                schema: schema.clone(),
                creating_for: self.creation_lag + 1,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> BackendResult<TableStatus> {
        self.faults.check(Operation::DescribeTable)?;
        let mut map = self.tables.write().expect("lock poisoned");
        let t = map.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        if t.creating_for > 0 {
            t.creating_for -= 1;
            // The describe that brings the countdown to zero still sees the
            // old status; the table is active from the next call on.
            return Ok(TableStatus::Creating);
        }
        Ok(TableStatus::Active)
    }

    async fn delete_table(&self, table: &str) -> BackendResult<()> {
        self.faults.check(Operation::DeleteTable)?;
        let mut map = self.tables.write().expect("lock poisoned");
        map.remove(table).map(|_| ()).ok_or_else(|| Self::not_found(table))
    }

    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>> {
        self.faults.check(Operation::GetItem)?;
        let map = self.tables.read().expect("lock poisoned");
        let t = active(&map, table)?;
        Ok(t.rows.get(&(key.partition.clone(), key.sort.clone())).cloned())
    }

    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()> {
        self.faults.check(Operation::PutItem)?;
        let mut map = self.tables.write().expect("lock poisoned");
        let t = active_mut(&mut map, table)?;
        let key = t.schema.key_of(&row).ok_or_else(|| BackendError::Validation {
            table: table.to_string(),
            reason: format!(
                "row must carry key attributes {:?} and {:?}",
                t.schema.partition_attribute, t.schema.sort_attribute
            ),
        })?;
        t.rows.insert((key.partition, key.sort), row);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>> {
        self.faults.check(Operation::DeleteItem)?;
        let mut map = self.tables.write().expect("lock poisoned");
        let t = active_mut(&mut map, table)?;
        Ok(t.rows.remove(&(key.partition.clone(), key.sort.clone())))
    }

    async fn query(
        &self,
        table: &str,
        partition: &str,
        filter: Option<&AttributeFilter>,
        exclusive_start: Option<&str>,
    ) -> BackendResult<QueryPage> {
        self.faults.check(Operation::Query)?;
        let map = self.tables.read().expect("lock poisoned");
        let t = active(&map, table)?;

        let lower = match exclusive_start {
            Some(sort) => Bound::Excluded((partition.to_string(), sort.to_string())),
            None => Bound::Included((partition.to_string(), String::new())),
        };
        let mut scan = t
            .rows
            .range((lower, Bound::Unbounded))
            .take_while(|((pk, _), _)| pk == partition);

        let examined: Vec<(&(String, String), &Row)> = scan.by_ref().take(self.page_size).collect();
        let last_evaluated = match scan.next() {
            Some(_) => examined.last().map(|((_, sk), _)| sk.clone()),
            None => None,
        };
        let rows = examined
            .into_iter()
            .map(|(_, row)| row)
            .filter(|row| filter.map_or(true, |f| f.matches(row)))
            .cloned()
            .collect();
        Ok(QueryPage { rows, last_evaluated })
    }
}

impl std::fmt::Debug for InMemoryTableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.tables.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryTableBackend")
            .field("table_count", &count)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str) -> TableSchema {
        TableSchema {
            table_name: name.into(),
            partition_attribute: "state".into(),
            sort_attribute: "id".into(),
            read_capacity: 5,
            write_capacity: 1,
        }
    }

    async fn active_table(backend: &InMemoryTableBackend, name: &str) {
        backend.create_table(&schema(name)).await.unwrap();
        while backend.describe_table(name).await.unwrap() != TableStatus::Active {}
    }

    fn row(pk: &str, sk: &str) -> Row {
        Row::new().with("state", pk).with("id", sk)
    }

    #[tokio::test]
    async fn table_goes_active_after_describe() {
        let backend = InMemoryTableBackend::new().with_creation_lag(2);
        backend.create_table(&schema("t")).await.unwrap();
        assert!(matches!(
            backend.get_item("t", &ItemKey::new("p", "s")).await,
            Err(BackendError::ResourceNotFound(_))
        ));
        let mut creating = 0;
        while backend.describe_table("t").await.unwrap() == TableStatus::Creating {
            creating += 1;
        }
        assert_eq!(creating, 3);
        assert!(backend.get_item("t", &ItemKey::new("p", "s")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_existing_table_is_in_use() {
        let backend = InMemoryTableBackend::new();
        active_table(&backend, "t").await;
        assert!(matches!(
            backend.create_table(&schema("t")).await,
            Err(BackendError::ResourceInUse(_))
        ));
    }

    #[tokio::test]
    async fn put_get_delete_item() {
        let backend = InMemoryTableBackend::new();
        active_table(&backend, "t").await;
        backend
            .put_item("t", row("p", "s").with("UserName", "alice"))
            .await
            .unwrap();
        let key = ItemKey::new("p", "s");
        let got = backend.get_item("t", &key).await.unwrap().expect("row");
        assert_eq!(got.get("UserName"), Some("alice"));

        let old = backend.delete_item("t", &key).await.unwrap();
        assert!(old.is_some());
        assert!(backend.delete_item("t", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_without_key_attribute_is_rejected() {
        let backend = InMemoryTableBackend::new();
        active_table(&backend, "t").await;
        assert!(matches!(
            backend.put_item("t", Row::new().with("state", "p")).await,
            Err(BackendError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn query_pages_stay_in_partition() {
        let backend = InMemoryTableBackend::new().with_page_size(2);
        active_table(&backend, "t").await;
        for sk in ["a", "b", "c"] {
            backend.put_item("t", row("p1", sk)).await.unwrap();
        }
        backend.put_item("t", row("p2", "a")).await.unwrap();

        let first = backend.query("t", "p1", None, None).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.last_evaluated.as_deref(), Some("b"));
        let second = backend.query("t", "p1", None, Some("b")).await.unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].get("id"), Some("c"));
        assert!(second.last_evaluated.is_none());
    }

    #[tokio::test]
    async fn filter_applies_after_page_limit() {
        let backend = InMemoryTableBackend::new().with_page_size(1);
        active_table(&backend, "t").await;
        backend.put_item("t", row("p", "a").with("UserName", "bob")).await.unwrap();
        backend.put_item("t", row("p", "b").with("UserName", "alice")).await.unwrap();

        let filter = AttributeFilter::equals("UserName", "alice");
        let first = backend.query("t", "p", Some(&filter), None).await.unwrap();
        assert!(first.rows.is_empty());
        assert_eq!(first.last_evaluated.as_deref(), Some("a"));
        let second = backend.query("t", "p", Some(&filter), Some("a")).await.unwrap();
        assert_eq!(second.rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_table_removes_rows() {
        let backend = InMemoryTableBackend::new();
        active_table(&backend, "t").await;
        backend.put_item("t", row("p", "s")).await.unwrap();
        backend.delete_table("t").await.unwrap();
        assert_eq!(backend.row_count("t"), 0);
        assert!(matches!(
            backend.delete_table("t").await,
            Err(BackendError::ResourceNotFound(_))
        ));
    }
}
