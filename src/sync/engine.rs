//! Per-conversation synchronization engine
//!
//! ```text
//! Unloaded --open--> Subscribing --first push--> Live --close/switch--> Closed
//!                         ^                                               |
//!                         +---------------------open----------------------+
//! ```
//!
//! The store subscription is the only source of ordering. Every push carries
//! the key and the open generation it was subscribed under, and pushes from
//! any other listener are dropped, so a late snapshot from a conversation the
//! user already left never lands in the current mirror, even after reopening
//! the same conversation.

use crate::{
    model::{fields, layout, ConversationKey, Message, OutgoingMessage},
    store::{Direction, Query, SharedStore, Write, WriteBatch},
    supervisor::{forward, SubscriptionSupervisor},
    sync::{
        mirror::{decode_messages, Mirror},
        outbox::MessageSender,
        receipts,
        selection::Selection,
        view::{build_thread_view, ThreadView},
    },
    upload::MediaUploader,
    Error, Result,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of the open conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing opened yet
    Unloaded,
    /// Listener attached, no snapshot yet
    Subscribing,
    /// Mirror reflects the store
    Live,
    /// Listener cancelled
    Closed,
}

/// Snapshot forwarded from a message listener
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Full message set of the conversation the listener was opened for
    Snapshot {
        /// Conversation the listener belongs to
        key: ConversationKey,
        /// Open call the listener was attached by
        generation: u64,
        /// Decoded messages in delivery order
        messages: Vec<Message>,
    },
}

struct OpenConversation {
    key: ConversationKey,
    other: String,
    generation: u64,
}

/// Owns the mirror of one open conversation at a time
pub struct SyncEngine {
    store: SharedStore,
    me: String,
    sender: MessageSender,
    state: EngineState,
    open: Option<OpenConversation>,
    generation: u64,
    listeners: SubscriptionSupervisor<ConversationKey>,
    tx: mpsc::UnboundedSender<SyncEvent>,
    rx: mpsc::UnboundedReceiver<SyncEvent>,
    mirror: Mirror,
    selection: Selection,
    auto_reconcile: bool,
    receipts: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Engine for `me`
    pub fn new(store: SharedStore, uploader: Arc<dyn MediaUploader>, me: impl Into<String>) -> Self {
        let me = me.into();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: MessageSender::new(store.clone(), uploader, me.clone()),
            store,
            me,
            state: EngineState::Unloaded,
            open: None,
            generation: 0,
            listeners: SubscriptionSupervisor::new(),
            tx,
            rx,
            mirror: Mirror::new(),
            selection: Selection::new(),
            auto_reconcile: true,
            receipts: None,
        }
    }

    /// Open the conversation with `other`, closing the current one first
    ///
    /// # Errors
    /// * `Error::SelfConversation` when `other` is the signed-in user
    /// * `Error::Store` when the listener cannot be attached
    pub async fn open(&mut self, other: &str) -> Result<ConversationKey> {
        let key = ConversationKey::for_pair(&self.me, other)?;

        self.listeners.cancel_all();
        self.mirror.clear();
        self.selection.disable();
        self.open = None;
        self.generation += 1;
        let generation = self.generation;

        let query = Query::new(layout::messages(&key)).order_by(fields::CREATED_AT, Direction::Ascending);
        let sub = match self.store.subscribe(query).await {
            Ok(sub) => sub,
            Err(e) => {
                self.state = EngineState::Closed;
                return Err(e.into());
            }
        };

        let tagged = key.clone();
        let task = forward(sub, self.tx.clone(), format!("messages:{}", key), move |docs| {
            SyncEvent::Snapshot {
                key: tagged.clone(),
                generation,
                messages: decode_messages(&docs),
            }
        });
        self.listeners.attach(key.clone(), task);

        self.open = Some(OpenConversation {
            key: key.clone(),
            other: other.to_string(),
            generation,
        });
        self.state = EngineState::Subscribing;
        info!("Opened conversation {}", key);
        Ok(key)
    }

    /// Stop listening and drop the mirror
    pub fn close(&mut self) {
        self.listeners.cancel_all();
        self.mirror.clear();
        self.selection.disable();
        if let Some(open) = self.open.take() {
            info!("Closed conversation {}", open.key);
        }
        self.state = EngineState::Closed;
    }

    /// Next forwarded snapshot
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    /// Apply a snapshot; returns whether it belonged to the open conversation
    pub fn apply(&mut self, event: SyncEvent) -> bool {
        let SyncEvent::Snapshot {
            key,
            generation,
            messages,
        } = event;

        let current = match &self.open {
            Some(open) if open.key == key && open.generation == generation => open.key.clone(),
            _ => {
                debug!("Dropping snapshot for {} (generation {}, not open)", key, generation);
                return false;
            }
        };

        self.mirror.replace(messages);
        self.selection.retain_existing(&self.mirror);
        if self.state == EngineState::Subscribing {
            debug!("Conversation {} is live", current);
        }
        self.state = EngineState::Live;

        if self.auto_reconcile && !self.mirror.is_empty() {
            self.spawn_reconciliation(current);
        }
        true
    }

    /// Wait for a snapshot and apply it; `false` if it was dropped
    pub async fn pump(&mut self) -> Result<bool> {
        match self.next_event().await {
            Some(event) => Ok(self.apply(event)),
            None => Err(Error::NoConversation),
        }
    }

    fn spawn_reconciliation(&mut self, key: ConversationKey) {
        if receipts::plan_read_receipts(self.mirror.messages(), &self.me).is_empty() {
            return;
        }
        let store = self.store.clone();
        let me = self.me.clone();
        let messages = self.mirror.messages().to_vec();
        self.receipts = Some(tokio::spawn(async move {
            if let Err(e) = receipts::reconcile_reads(&store, &key, &messages, &me).await {
                warn!("Failed to mark messages read in {}: {}", key, e);
            }
        }));
    }

    /// Wait for the latest spawned read reconciliation to finish
    pub async fn settle_receipts(&mut self) {
        if let Some(task) = self.receipts.take() {
            if let Err(e) = task.await {
                warn!("Read reconciliation task failed: {}", e);
            }
        }
    }

    /// Mark unread incoming messages read now; returns how many were flipped
    pub async fn reconcile_reads(&self) -> Result<usize> {
        let open = self.open.as_ref().ok_or(Error::NoConversation)?;
        receipts::reconcile_reads(&self.store, &open.key, self.mirror.messages(), &self.me).await
    }

    /// Toggle reconciliation after every push
    pub fn set_auto_reconcile(&mut self, enabled: bool) {
        self.auto_reconcile = enabled;
    }

    /// Send to the open conversation; returns the new message id
    pub async fn send(&self, outgoing: OutgoingMessage) -> Result<String> {
        let open = self.open.as_ref().ok_or(Error::NoConversation)?;
        self.sender.send(&open.key, &open.other, outgoing).await
    }

    /// Handle for sending from another task
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    /// Delete exactly `ids` from the open conversation; metadata is untouched
    pub async fn delete_messages(&self, ids: &[String]) -> Result<usize> {
        let open = self.open.as_ref().ok_or(Error::NoConversation)?;
        if ids.is_empty() {
            return Ok(0);
        }

        let batch: WriteBatch = ids
            .iter()
            .map(|id| Write::delete(layout::message(&open.key, id)))
            .collect();
        self.store.write_batch(batch).await?;
        info!("Deleted {} messages from {}", ids.len(), open.key);
        Ok(ids.len())
    }

    /// Delete the selected messages and leave delete mode
    pub async fn delete_selected(&mut self) -> Result<usize> {
        let ids = self.selection.ids();
        let deleted = self.delete_messages(&ids).await?;
        self.selection.disable();
        Ok(deleted)
    }

    /// Delete every message of the open conversation; metadata is untouched
    pub async fn clear_conversation(&self) -> Result<usize> {
        let open = self.open.as_ref().ok_or(Error::NoConversation)?;
        let docs = self
            .store
            .get_once(&Query::new(layout::messages(&open.key)))
            .await?;
        if docs.is_empty() {
            return Ok(0);
        }

        let count = docs.len();
        let batch: WriteBatch = docs.into_iter().map(|doc| Write::delete(doc.path)).collect();
        self.store.write_batch(batch).await?;
        info!("Cleared {} messages from {}", count, open.key);
        Ok(count)
    }

    /// Render the mirror
    pub fn thread_view<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> ThreadView {
        build_thread_view(self.mirror.messages(), &self.me, &self.selection, now, tz)
    }

    /// Delete-mode selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Delete-mode selection, mutable
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Number of `open` calls so far; snapshots carry the value of their call
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Key of the open conversation
    pub fn current_key(&self) -> Option<&ConversationKey> {
        self.open.as_ref().map(|open| &open.key)
    }

    /// Mirrored messages in display order
    pub fn messages(&self) -> &[Message] {
        self.mirror.messages()
    }

    /// Signed-in user
    pub fn me(&self) -> &str {
        &self.me
    }
}
