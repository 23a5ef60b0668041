//! Wire-level shapes exchanged with the backing services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of a table: a flat map of string attributes.
///
/// Key attributes live in the same map as every other attribute; which
/// attribute names form the key is decided by the table's [`TableSchema`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(attribute, value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(attribute.into(), value.into())
    }

    pub fn remove(&mut self, attribute: &str) -> Option<String> {
        self.0.remove(attribute)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Composite primary key of a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub partition: String,
    pub sort: String,
}

impl ItemKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

/// Definition of a two-part-key table with string key attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    /// Attribute holding the partition (hash) key.
    pub partition_attribute: String,
    /// Attribute holding the sort (range) key.
    pub sort_attribute: String,
    pub read_capacity: u64,
    pub write_capacity: u64,
}

impl TableSchema {
    /// Extract the key of `row` under this schema.
    pub fn key_of(&self, row: &Row) -> Option<ItemKey> {
        Some(ItemKey::new(
            row.get(&self.partition_attribute)?,
            row.get(&self.sort_attribute)?,
        ))
    }
}

/// Provisioning state of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
    Deleting,
}

/// Equality filter applied to rows of a partition query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeFilter {
    Equals { attribute: String, value: String },
}

impl AttributeFilter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Equals { attribute, value } => row.get(attribute) == Some(value.as_str()),
        }
    }
}

/// One page of a partition query.
///
/// As with the real service, the filter is applied after the page limit, so
/// a page may hold no rows and still carry a continuation key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub rows: Vec<Row>,
    /// Sort key to resume after, or `None` on the last page.
    pub last_evaluated: Option<String>,
}

/// One page of an object listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// Key to resume after, or `None` on the last page.
    pub continuation: Option<String>,
}

/// Object metadata returned by a head request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}
