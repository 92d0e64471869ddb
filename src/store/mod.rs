//! Realtime document-store contract
//!
//! The sync core never talks to a particular database. It consumes the
//! primitives every realtime document store offers:
//! - `subscribe` to a query and receive full ordered snapshots on change
//! - one-shot `get` / `get_once` reads
//! - atomic `write_batch` across several documents
//! - a server-timestamp sentinel resolved at commit time
//!
//! Two hosts implement the contract locally: [`MemoryStore`] (tests,
//! embedding) and [`SqliteStore`] (persistent single-node backend).

pub mod error;
pub mod live;
pub mod memory;
pub mod path;
pub mod query;
pub mod sqlite;
pub mod write;

pub use error::{StoreError, StoreResult};
pub use live::{RealtimeStore, ServerClock};
pub use memory::{MemoryBackend, MemoryStore};
pub use path::{CollectionPath, DocPath};
pub use query::{Direction, Filter, Query};
pub use sqlite::{SqliteBackend, SqliteStore};
pub use write::{FieldValue, Fields, Write, WriteBatch, WriteMode};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A stored document: its path plus JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where the document lives
    pub path: DocPath,
    /// Stored fields
    pub fields: Map<String, Value>,
}

impl Document {
    /// Build a document
    pub fn new(path: DocPath, fields: Map<String, Value>) -> Self {
        Self { path, fields }
    }

    /// Document id
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Raw field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Deserialize the fields into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Decode {
                path: self.path.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// Live result stream returned by `subscribe`; dropping it cancels the listener.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Wrap a listener task and the channel it feeds
    pub fn new(rx: mpsc::UnboundedReceiver<T>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next snapshot; `None` once the listener has ended
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Snapshot already delivered, without waiting
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Stop listening
    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Primitives consumed from the realtime document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>>;

    /// Run a query once
    async fn get_once(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Listen to a query; the current result is delivered first, then every change
    async fn subscribe(&self, query: Query) -> StoreResult<Subscription<Vec<Document>>>;

    /// Listen to one document; `None` while it does not exist
    async fn subscribe_doc(&self, path: DocPath) -> StoreResult<Subscription<Option<Document>>>;

    /// Apply every write or none of them
    async fn write_batch(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Store handle shared between the engine, the directory and spawned tasks.
pub type SharedStore = Arc<dyn DocumentStore>;
