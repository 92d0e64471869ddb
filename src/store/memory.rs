//! In-memory backend

use super::{
    error::StoreError,
    live::{DocumentBackend, RealtimeStore, ServerClock},
    path::{CollectionPath, DocPath},
    write::ResolvedWrite,
    Document, StoreResult,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Documents held in a map; batches are staged in an overlay and swapped in.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    docs: HashMap<DocPath, Map<String, Value>>,
}

impl DocumentBackend for MemoryBackend {
    fn load(&self, path: &DocPath) -> StoreResult<Option<Map<String, Value>>> {
        Ok(self.docs.get(path).cloned())
    }

    fn scan(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        Ok(self
            .docs
            .iter()
            .filter(|(path, _)| path.parent() == collection)
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect())
    }

    fn commit(&mut self, writes: &[ResolvedWrite], fail_at: Option<usize>) -> StoreResult<()> {
        let mut staged: HashMap<DocPath, Option<Map<String, Value>>> = HashMap::new();

        for (index, write) in writes.iter().enumerate() {
            if fail_at == Some(index) {
                return Err(StoreError::Unavailable(format!(
                    "injected fault at write {} ({})",
                    index, write.target
                )));
            }
            let current = match staged.get(&write.target) {
                Some(doc) => doc.clone(),
                None => self.docs.get(&write.target).cloned(),
            };
            let next = write.apply(current)?;
            staged.insert(write.target.clone(), next);
        }

        for (path, doc) in staged {
            match doc {
                Some(fields) => {
                    self.docs.insert(path, fields);
                }
                None => {
                    self.docs.remove(&path);
                }
            }
        }
        Ok(())
    }
}

/// Realtime store kept entirely in memory.
pub type MemoryStore = RealtimeStore<MemoryBackend>;

impl MemoryStore {
    /// Empty store with a wall-time clock
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::default())
    }

    /// Empty store whose first commit time is at least `millis`
    pub fn starting_at(millis: i64) -> Self {
        Self::with_clock(MemoryBackend::default(), ServerClock::starting_at(millis))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
