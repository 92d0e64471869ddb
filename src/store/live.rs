//! Realtime layer shared by the local store hosts
//!
//! A [`RealtimeStore`] wraps a synchronous [`DocumentBackend`] and adds what
//! the contract needs on top of plain storage: commit-time timestamps,
//! change fan-out to live queries, and fault injection for batch tests.

use super::{
    path::{CollectionPath, DocPath},
    query::Query,
    write::{ResolvedWrite, WriteBatch},
    Document, DocumentStore, StoreResult, Subscription,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, warn};

/// Capacity of the change fan-out; slower listeners re-query after lagging
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Sentinel for "no fault armed"
const NO_FAULT: usize = usize::MAX;

/// Synchronous document storage driven by [`RealtimeStore`].
pub trait DocumentBackend: Send + 'static {
    /// Fields of one document
    fn load(&self, path: &DocPath) -> StoreResult<Option<Map<String, Value>>>;

    /// Every document directly inside `collection`
    fn scan(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>>;

    /// Apply all writes atomically.
    ///
    /// When `fail_at` is set, the write at that index must fail after the
    /// earlier ones were staged, and nothing may become visible.
    fn commit(&mut self, writes: &[ResolvedWrite], fail_at: Option<usize>) -> StoreResult<()>;
}

/// Strictly increasing commit clock (epoch milliseconds).
#[derive(Debug)]
pub struct ServerClock {
    last: AtomicI64,
}

impl ServerClock {
    /// Clock following wall time
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Clock whose first tick is at least `millis`
    pub fn starting_at(millis: i64) -> Self {
        Self {
            last: AtomicI64::new(millis - 1),
        }
    }

    /// Next commit time: wall time, bumped past the previous tick if needed
    pub fn tick(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared<B> {
    backend: Mutex<B>,
    changes: broadcast::Sender<Arc<Vec<DocPath>>>,
    clock: ServerClock,
    fail_at: AtomicUsize,
    commits: AtomicUsize,
}

impl<B: DocumentBackend> Shared<B> {
    async fn run_query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let backend = self.backend.lock().await;
        let docs = backend.scan(&query.collection)?;
        Ok(query.evaluate(docs))
    }

    async fn load(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let backend = self.backend.lock().await;
        Ok(backend
            .load(path)?
            .map(|fields| Document::new(path.clone(), fields)))
    }
}

/// Realtime document store over a local backend.
pub struct RealtimeStore<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for RealtimeStore<B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<B: DocumentBackend> RealtimeStore<B> {
    /// Wrap a backend with a wall-time clock
    pub fn with_backend(backend: B) -> Self {
        Self::with_clock(backend, ServerClock::new())
    }

    /// Wrap a backend with an explicit clock
    pub fn with_clock(backend: B, clock: ServerClock) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                backend: Mutex::new(backend),
                changes,
                clock,
                fail_at: AtomicUsize::new(NO_FAULT),
                commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next batch fail at write `index`, after the earlier writes were staged
    #[cfg(test)]
    pub fn fail_next_batch_at(&self, index: usize) {
        self.shared.fail_at.store(index, Ordering::SeqCst);
    }

    /// Number of batches committed so far
    pub fn committed_batches(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }
}

/// Wait until a relevant path changes; `false` once the store is gone
async fn wait_for_change<F>(changes: &mut broadcast::Receiver<Arc<Vec<DocPath>>>, relevant: F) -> bool
where
    F: Fn(&DocPath) -> bool,
{
    loop {
        match changes.recv().await {
            Ok(paths) => {
                if paths.iter().any(&relevant) {
                    return true;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Live query lagged by {} changes, re-reading", skipped);
                return true;
            }
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}

#[async_trait]
impl<B: DocumentBackend> DocumentStore for RealtimeStore<B> {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        self.shared.load(path).await
    }

    async fn get_once(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.shared.run_query(query).await
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Subscription<Vec<Document>>> {
        // Register for changes before the first read so nothing slips between them
        let mut changes = self.shared.changes.subscribe();
        let initial = self.shared.run_query(&query).await?;

        debug!("Listening to {}", query.collection);
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial.clone());

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let mut last = initial;
            loop {
                let collection = &query.collection;
                if !wait_for_change(&mut changes, |p| p.parent() == collection).await {
                    return;
                }
                match shared.run_query(&query).await {
                    Ok(docs) => {
                        if docs != last {
                            last = docs.clone();
                            if tx.send(docs).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Live query on {} failed: {}", query.collection, e),
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }

    async fn subscribe_doc(&self, path: DocPath) -> StoreResult<Subscription<Option<Document>>> {
        let mut changes = self.shared.changes.subscribe();
        let initial = self.shared.load(&path).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial.clone());

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let mut last = initial;
            loop {
                if !wait_for_change(&mut changes, |p| p == &path).await {
                    return;
                }
                match shared.load(&path).await {
                    Ok(doc) => {
                        if doc != last {
                            last = doc.clone();
                            if tx.send(doc).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Live read of {} failed: {}", path, e),
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }

    async fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let fail_at = match self.shared.fail_at.swap(NO_FAULT, Ordering::SeqCst) {
            NO_FAULT => None,
            index => Some(index),
        };

        let paths = {
            let mut backend = self.shared.backend.lock().await;
            // Tick under the lock so commit order and timestamps agree
            let now = self.shared.clock.tick();
            let writes: Vec<ResolvedWrite> = batch.into_iter().map(|w| w.resolve(now)).collect();
            backend.commit(&writes, fail_at)?;
            debug!("Committed batch of {} writes at {}", writes.len(), now);
            writes.into_iter().map(|w| w.target).collect::<Vec<_>>()
        };

        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        // No live listeners is fine
        let _ = self.shared.changes.send(Arc::new(paths));
        Ok(())
    }
}
