//! Batch writes and field values

use super::{error::StoreError, path::DocPath, StoreResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A field value in a write, possibly the server-timestamp sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal JSON value
    Value(Value),
    /// Replaced by the store's commit time (epoch milliseconds)
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Value(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Value(Value::String(v.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Value(Value::String(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Value(Value::Bool(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Value(Value::from(v))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::Value(Value::from(v))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(v: Option<String>) -> Self {
        FieldValue::Value(v.map(Value::String).unwrap_or(Value::Null))
    }
}

/// Ordered set of field assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    /// Empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style assignment
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Assign a field
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Value assigned to `name`, if any
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Number of assigned fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is assigned
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace sentinels with `now` and produce stored JSON fields
    pub fn resolve(self, now: i64) -> Map<String, Value> {
        self.0
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::Value(v) => (k, v),
                FieldValue::ServerTimestamp => (k, Value::from(now)),
            })
            .collect()
    }
}

/// How a write combines with the document already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document
    Overwrite,
    /// Create if absent, otherwise replace the given fields
    Merge,
    /// Create if absent, otherwise set only fields that are not present yet
    Fill,
    /// Create; fails with `Conflict` if the document exists
    Create,
    /// Merge into an existing document; fails with `NotFound` if absent
    Update,
    /// Remove the document
    Delete,
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    /// Target document
    pub target: DocPath,
    /// Combination mode
    pub mode: WriteMode,
    /// Field assignments (ignored for `Delete`)
    pub fields: Fields,
}

impl Write {
    /// Replace the document
    pub fn overwrite(target: DocPath, fields: Fields) -> Self {
        Self { target, mode: WriteMode::Overwrite, fields }
    }

    /// Merge fields, creating the document if needed
    pub fn merge(target: DocPath, fields: Fields) -> Self {
        Self { target, mode: WriteMode::Merge, fields }
    }

    /// Set fields that are still absent, creating the document if needed
    pub fn fill(target: DocPath, fields: Fields) -> Self {
        Self { target, mode: WriteMode::Fill, fields }
    }

    /// Create a document that must not exist yet
    pub fn create(target: DocPath, fields: Fields) -> Self {
        Self { target, mode: WriteMode::Create, fields }
    }

    /// Merge into a document that must exist
    pub fn update(target: DocPath, fields: Fields) -> Self {
        Self { target, mode: WriteMode::Update, fields }
    }

    /// Delete the document
    pub fn delete(target: DocPath) -> Self {
        Self { target, mode: WriteMode::Delete, fields: Fields::new() }
    }

    /// Resolve server timestamps against the commit time
    pub fn resolve(self, now: i64) -> ResolvedWrite {
        ResolvedWrite {
            target: self.target,
            mode: self.mode,
            fields: self.fields.resolve(now),
        }
    }
}

/// A write whose sentinels have been replaced by the commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWrite {
    /// Target document
    pub target: DocPath,
    /// Combination mode
    pub mode: WriteMode,
    /// Stored field values
    pub fields: Map<String, Value>,
}

impl ResolvedWrite {
    /// Apply this write on top of `existing`; `None` means the document is gone
    pub fn apply(
        &self,
        existing: Option<Map<String, Value>>,
    ) -> StoreResult<Option<Map<String, Value>>> {
        match self.mode {
            WriteMode::Overwrite => Ok(Some(self.fields.clone())),
            WriteMode::Merge => {
                let mut doc = existing.unwrap_or_default();
                doc.extend(self.fields.clone());
                Ok(Some(doc))
            }
            WriteMode::Fill => {
                let mut doc = existing.unwrap_or_default();
                for (k, v) in &self.fields {
                    doc.entry(k.clone()).or_insert_with(|| v.clone());
                }
                Ok(Some(doc))
            }
            WriteMode::Create => match existing {
                Some(_) => Err(StoreError::Conflict(self.target.to_string())),
                None => Ok(Some(self.fields.clone())),
            },
            WriteMode::Update => match existing {
                Some(mut doc) => {
                    doc.extend(self.fields.clone());
                    Ok(Some(doc))
                }
                None => Err(StoreError::NotFound(self.target.to_string())),
            },
            WriteMode::Delete => Ok(None),
        }
    }
}

/// Atomic, all-or-nothing list of writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write
    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    /// Builder-style append
    pub fn with(mut self, write: Write) -> Self {
        self.push(write);
        self
    }

    /// Number of writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch holds no writes
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Writes in order
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

impl FromIterator<Write> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = Write>>(iter: I) -> Self {
        Self {
            writes: iter.into_iter().collect(),
        }
    }
}
