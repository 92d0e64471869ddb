// Shared test helpers: seeded stores, canned uploaders and bounded waits

use crate::directory::DirectoryWatcher;
use crate::model::{fields, layout, ConversationKey, UserProfile};
use crate::store::{
    DocPath, Document, DocumentStore, Fields, MemoryStore, Query, SharedStore, StoreResult,
    StoreError, Subscription, Write, WriteBatch,
};
use crate::sync::SyncEngine;
use crate::upload::{MediaFile, MediaUploader};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn shared(store: &MemoryStore) -> SharedStore {
    Arc::new(store.clone())
}

pub fn profile(uid: &str, full_name: &str) -> UserProfile {
    UserProfile {
        full_name: full_name.to_string(),
        username: Some(full_name.to_lowercase()),
        avatar_url: Some(format!("https://img.test/{}.png", uid)),
        ..UserProfile::new(uid)
    }
}

pub async fn seed_user(store: &SharedStore, user: &UserProfile) {
    let mut record = Fields::new();
    if let serde_json::Value::Object(map) =
        serde_json::to_value(user).expect("Failed to serialize profile")
    {
        for (name, value) in map {
            record.set(&name, value);
        }
    }
    store
        .write_batch(WriteBatch::new().with(Write::overwrite(layout::user(&user.uid), record)))
        .await
        .expect("Failed to seed user");
}

pub async fn seed_message(
    store: &SharedStore,
    key: &ConversationKey,
    id: &str,
    sender: &str,
    text: &str,
    created_at: i64,
    read: bool,
) {
    let message = Fields::new()
        .with(fields::SENDER_ID, sender)
        .with(fields::CREATED_AT, created_at)
        .with(fields::READ, read)
        .with(fields::KIND, "text")
        .with(fields::TEXT, text);
    store
        .write_batch(WriteBatch::new().with(Write::overwrite(layout::message(key, id), message)))
        .await
        .expect("Failed to seed message");
}

pub async fn doc(store: &SharedStore, path: &DocPath) -> Option<Document> {
    store.get(path).await.expect("Failed to read document")
}

pub async fn message_ids(store: &SharedStore, key: &ConversationKey) -> Vec<String> {
    let mut ids: Vec<String> = store
        .get_once(&Query::new(layout::messages(key)))
        .await
        .expect("Failed to list messages")
        .iter()
        .map(|d| d.id().to_string())
        .collect();
    ids.sort();
    ids
}

/// Pump the engine until `done` holds for its mirror
pub async fn pump_engine_until<F>(engine: &mut SyncEngine, done: F)
where
    F: Fn(&SyncEngine) -> bool,
{
    timeout(WAIT, async {
        while !done(engine) {
            engine.pump().await.expect("Engine channel closed");
        }
    })
    .await
    .expect("Timed out waiting for the engine");
}

/// Pump the directory watcher until `done` holds
pub async fn pump_directory_until<F>(watcher: &mut DirectoryWatcher, done: F)
where
    F: Fn(&DirectoryWatcher) -> bool,
{
    timeout(WAIT, async {
        while !done(watcher) {
            watcher.pump().await.expect("Failed to apply directory event");
        }
    })
    .await
    .expect("Timed out waiting for the directory");
}

pub async fn next_snapshot<T>(sub: &mut Subscription<T>) -> T {
    timeout(WAIT, sub.next())
        .await
        .expect("Timed out waiting for a snapshot")
        .expect("Subscription ended")
}

pub fn png(name: &str) -> MediaFile {
    MediaFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

pub fn mp4(name: &str) -> MediaFile {
    MediaFile::new(name, "video/mp4", vec![0, 0, 0, 0x18])
}

/// Returns a fixed URL and counts calls
#[derive(Default)]
pub struct StaticUploader {
    pub url: String,
    pub calls: AtomicUsize,
}

impl StaticUploader {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaUploader for StaticUploader {
    async fn upload(&self, _file: MediaFile) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.url.clone())
    }
}

/// Always fails
pub struct FailingUploader;

#[async_trait]
impl MediaUploader for FailingUploader {
    async fn upload(&self, file: MediaFile) -> Result<String> {
        Err(Error::Upload(format!("endpoint refused {}", file.file_name)))
    }
}

/// Blocks every upload until released
#[derive(Default)]
pub struct GatedUploader {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl MediaUploader for GatedUploader {
    async fn upload(&self, _file: MediaFile) -> Result<String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok("https://cdn.test/slow.png".to_string())
    }
}

/// Store that lets `intruder` run right before every batch is committed
pub struct InterleavingStore<F> {
    pub inner: MemoryStore,
    pub intruder: F,
}

#[async_trait]
impl<F> DocumentStore for InterleavingStore<F>
where
    F: Fn() -> WriteBatch + Send + Sync,
{
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        self.inner.get(path).await
    }

    async fn get_once(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.get_once(query).await
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Subscription<Vec<Document>>> {
        self.inner.subscribe(query).await
    }

    async fn subscribe_doc(&self, path: DocPath) -> StoreResult<Subscription<Option<Document>>> {
        self.inner.subscribe_doc(path).await
    }

    async fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.write_batch((self.intruder)()).await?;
        self.inner.write_batch(batch).await
    }
}

/// Store whose next `subscribe_doc` on a chosen path fails, and whose writes can be made to panic
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_doc: Mutex<Option<DocPath>>,
    panic_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_doc: Mutex::new(None),
            panic_writes: AtomicBool::new(false),
        }
    }

    pub fn panic_on_write(&self, panic: bool) {
        self.panic_writes.store(panic, Ordering::SeqCst);
    }

    pub fn fail_doc_once(&self, path: DocPath) {
        *self.fail_doc.lock().expect("Lock poisoned") = Some(path);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        self.inner.get(path).await
    }

    async fn get_once(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.get_once(query).await
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Subscription<Vec<Document>>> {
        self.inner.subscribe(query).await
    }

    async fn subscribe_doc(&self, path: DocPath) -> StoreResult<Subscription<Option<Document>>> {
        let fail = {
            let mut target = self.fail_doc.lock().expect("Lock poisoned");
            if target.as_ref() == Some(&path) {
                target.take();
                true
            } else {
                false
            }
        };
        if fail {
            return Err(StoreError::Unavailable("transient".to_string()));
        }
        self.inner.subscribe_doc(path).await
    }

    async fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.panic_writes.load(Ordering::SeqCst) {
            panic!("write rejected by test store");
        }
        self.inner.write_batch(batch).await
    }
}
