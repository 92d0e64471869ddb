//! Conversation directory
//!
//! Every user owns an index at `userChats/{uid}/chats` with one entry per
//! conversation they take part in. [`start_chat`] maintains both users'
//! entries together with the shared `chats/{key}` record; the
//! [`DirectoryWatcher`] turns the index plus the live profiles and metadata
//! it references into an ordered conversation list.

use crate::{
    model::{fields, layout, ConversationKey, ConversationMeta, DirectoryEntry, UserProfile},
    store::{Document, FieldValue, Fields, Query, SharedStore, Write, WriteBatch},
    supervisor::{forward, SubscriptionSupervisor},
    Result,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Preview shown for a conversation without messages
pub const EMPTY_PREVIEW: &str = "Start chatting";

/// Default number of preview characters in the conversation list
pub const DEFAULT_PREVIEW_CHARS: usize = 20;

fn directory_fields(of: &UserProfile) -> Fields {
    Fields::new()
        .with(fields::OTHER_ID, of.uid.as_str())
        .with(fields::FULL_NAME, of.full_name.as_str())
        .with(fields::AVATAR_URL, of.avatar_url.clone())
        .with(fields::LAST_ACTIVITY_AT, FieldValue::ServerTimestamp)
}

/// Start (or reopen) the conversation between `me` and `other`
///
/// Issues one atomic batch:
/// 1. `chats/{key}`: participants, empty preview and activity time, only
///    where absent, so an existing conversation keeps its last message
/// 2. `userChats/{me}/chats/{key}`: the other participant's display fields
/// 3. `userChats/{other}/chats/{key}`: mine
///
/// Either all three land or none do.
///
/// # Errors
/// * `Error::SelfConversation` when both profiles are the same user
/// * `Error::Store` when the batch is rejected
pub async fn start_chat(
    store: &SharedStore,
    me: &UserProfile,
    other: &UserProfile,
) -> Result<ConversationKey> {
    let key = ConversationKey::for_pair(&me.uid, &other.uid)?;

    let meta = Fields::new()
        .with(fields::PARTICIPANTS, vec![me.uid.clone(), other.uid.clone()])
        .with(fields::LAST_MESSAGE, "")
        .with(fields::LAST_ACTIVITY_AT, FieldValue::ServerTimestamp);

    let batch = WriteBatch::new()
        .with(Write::fill(layout::chat(&key), meta))
        .with(Write::merge(
            layout::directory_entry(&me.uid, &key),
            directory_fields(other),
        ))
        .with(Write::merge(
            layout::directory_entry(&other.uid, &key),
            directory_fields(me),
        ));

    store.write_batch(batch).await?;
    info!("Started conversation {} ({} <-> {})", key, me.uid, other.uid);
    Ok(key)
}

/// Listener keys held by a [`DirectoryWatcher`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchKey {
    /// The user's own directory
    Directory,
    /// Another participant's profile
    Profile(String),
    /// Shared metadata of one conversation
    Meta(ConversationKey),
}

/// Snapshot forwarded to a [`DirectoryWatcher`]
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    /// Full directory contents
    Entries(Vec<Document>),
    /// Profile of a participant (`None` while it does not exist)
    Profile(String, Option<Document>),
    /// Metadata of a conversation (`None` while it does not exist)
    Meta(ConversationKey, Option<Document>),
}

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq)]
pub struct ChatListItem {
    /// Conversation key
    pub key: ConversationKey,
    /// The other participant
    pub other_id: String,
    /// Their name, live when available
    pub full_name: String,
    /// Their avatar, live when available, else the default avatar
    pub avatar_url: String,
    /// Truncated last message, or [`EMPTY_PREVIEW`]
    pub preview: String,
    /// Latest activity (epoch milliseconds)
    pub last_activity_at: Option<i64>,
    /// Their presence flag
    pub online: bool,
}

/// Live conversation list for one user
pub struct DirectoryWatcher {
    store: SharedStore,
    me: String,
    preview_max_chars: usize,
    default_avatar_url: String,
    supervisor: SubscriptionSupervisor<WatchKey>,
    tx: mpsc::UnboundedSender<DirectoryEvent>,
    rx: mpsc::UnboundedReceiver<DirectoryEvent>,
    entries: BTreeMap<ConversationKey, DirectoryEntry>,
    profiles: HashMap<String, UserProfile>,
    metas: HashMap<ConversationKey, ConversationMeta>,
}

impl DirectoryWatcher {
    /// Start listening to `me`'s directory
    ///
    /// Previews are cut to `preview_max_chars`; participants without an
    /// avatar are shown with `default_avatar_url`.
    pub async fn start(
        store: SharedStore,
        me: &str,
        preview_max_chars: usize,
        default_avatar_url: impl Into<String>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = Self {
            store,
            me: me.to_string(),
            preview_max_chars,
            default_avatar_url: default_avatar_url.into(),
            supervisor: SubscriptionSupervisor::new(),
            tx,
            rx,
            entries: BTreeMap::new(),
            profiles: HashMap::new(),
            metas: HashMap::new(),
        };

        let sub = watcher
            .store
            .subscribe(Query::new(layout::directory(me)))
            .await?;
        let task = forward(
            sub,
            watcher.tx.clone(),
            format!("directory:{}", me),
            DirectoryEvent::Entries,
        );
        watcher.supervisor.attach(WatchKey::Directory, task);
        debug!("Watching directory of {}", me);
        Ok(watcher)
    }

    /// Next forwarded snapshot
    pub async fn next_event(&mut self) -> Option<DirectoryEvent> {
        self.rx.recv().await
    }

    /// Wait for one snapshot and apply it; `false` once nothing more can arrive
    pub async fn pump(&mut self) -> Result<bool> {
        match self.next_event().await {
            Some(event) => {
                self.apply(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply a snapshot, attaching or cancelling secondary listeners as entries come and go
    pub async fn apply(&mut self, event: DirectoryEvent) -> Result<()> {
        match event {
            DirectoryEvent::Entries(docs) => self.apply_entries(docs).await,
            DirectoryEvent::Profile(uid, doc) => {
                // Late snapshot from a listener cancelled by an earlier push
                if !self.entries.values().any(|e| e.other_id == uid) {
                    return Ok(());
                }
                match doc.map(|d| d.decode::<UserProfile>()).transpose() {
                    Ok(Some(profile)) => {
                        self.profiles.insert(uid, profile);
                    }
                    Ok(None) => {
                        self.profiles.remove(&uid);
                    }
                    Err(e) => warn!("Ignoring unreadable profile {}: {}", uid, e),
                }
                Ok(())
            }
            DirectoryEvent::Meta(key, doc) => {
                if !self.entries.contains_key(&key) {
                    return Ok(());
                }
                match doc.map(|d| d.decode::<ConversationMeta>()).transpose() {
                    Ok(Some(meta)) => {
                        self.metas.insert(key, meta);
                    }
                    Ok(None) => {
                        self.metas.remove(&key);
                    }
                    Err(e) => warn!("Ignoring unreadable metadata {}: {}", key, e),
                }
                Ok(())
            }
        }
    }

    async fn apply_entries(&mut self, docs: Vec<Document>) -> Result<()> {
        let mut entries = BTreeMap::new();
        for doc in &docs {
            match doc.decode::<DirectoryEntry>() {
                Ok(entry) => {
                    entries.insert(ConversationKey::from_stored(doc.id()), entry);
                }
                Err(e) => warn!("Ignoring unreadable directory entry {}: {}", doc.path, e),
            }
        }

        let keys: Vec<ConversationKey> = entries.keys().cloned().collect();
        let others: Vec<String> = entries.values().map(|e| e.other_id.clone()).collect();

        self.supervisor.retain(|watch| match watch {
            WatchKey::Directory => true,
            WatchKey::Meta(key) => keys.contains(key),
            WatchKey::Profile(uid) => others.contains(uid),
        });
        self.metas.retain(|key, _| keys.contains(key));
        self.profiles.retain(|uid, _| others.contains(uid));
        self.entries = entries;

        let missing = self.attach_missing().await;
        debug!(
            "Directory of {} has {} conversations, {} listeners ({} missing)",
            self.me,
            self.entries.len(),
            self.supervisor.len(),
            missing
        );
        Ok(())
    }

    /// Attach metadata and profile listeners for entries that have none
    ///
    /// A listener that cannot be attached is skipped; the entry is still
    /// listed from its own fields and the next directory push retries.
    /// Returns how many listeners are still missing.
    pub async fn attach_missing(&mut self) -> usize {
        let mut wanted: Vec<WatchKey> = Vec::new();
        for (key, entry) in &self.entries {
            wanted.push(WatchKey::Meta(key.clone()));
            let profile = WatchKey::Profile(entry.other_id.clone());
            if !wanted.contains(&profile) {
                wanted.push(profile);
            }
        }

        let mut missing = 0;
        for watch in wanted {
            if self.supervisor.is_live(&watch) {
                continue;
            }
            let task = match &watch {
                WatchKey::Meta(key) => {
                    match self.store.subscribe_doc(layout::chat(key)).await {
                        Ok(sub) => {
                            let tagged = key.clone();
                            Some(forward(sub, self.tx.clone(), format!("meta:{}", key), move |doc| {
                                DirectoryEvent::Meta(tagged.clone(), doc)
                            }))
                        }
                        Err(e) => {
                            warn!("Failed to watch metadata of {}: {}", key, e);
                            None
                        }
                    }
                }
                WatchKey::Profile(uid) => match self.store.subscribe_doc(layout::user(uid)).await {
                    Ok(sub) => {
                        let tagged = uid.clone();
                        Some(forward(sub, self.tx.clone(), format!("profile:{}", uid), move |doc| {
                            DirectoryEvent::Profile(tagged.clone(), doc)
                        }))
                    }
                    Err(e) => {
                        warn!("Failed to watch profile of {}: {}", uid, e);
                        None
                    }
                },
                WatchKey::Directory => None,
            };
            match task {
                Some(task) => self.supervisor.attach(watch, task),
                None => missing += 1,
            }
        }
        missing
    }

    /// Conversations, most recent activity first
    pub fn chat_list(&self) -> Vec<ChatListItem> {
        let mut items: Vec<ChatListItem> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let meta = self.metas.get(key);
                let profile = self.profiles.get(&entry.other_id);

                let preview = match meta.map(|m| m.last_message.as_str()) {
                    Some(text) if !text.is_empty() => {
                        text.chars().take(self.preview_max_chars).collect()
                    }
                    _ => EMPTY_PREVIEW.to_string(),
                };

                ChatListItem {
                    key: key.clone(),
                    other_id: entry.other_id.clone(),
                    full_name: profile
                        .map(|p| p.full_name.clone())
                        .unwrap_or_else(|| entry.full_name.clone()),
                    avatar_url: match profile {
                        Some(p) => p.avatar_or(&self.default_avatar_url),
                        None => entry.avatar_or(&self.default_avatar_url),
                    }
                    .to_string(),
                    preview,
                    last_activity_at: meta
                        .and_then(|m| m.last_activity_at)
                        .or(entry.last_activity_at),
                    online: profile.map(|p| p.online).unwrap_or(false),
                }
            })
            .collect();

        items.sort_by(|a, b| match (a.last_activity_at, b.last_activity_at) {
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.key.cmp(&b.key)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.key.cmp(&b.key),
        });
        items
    }

    /// Entry for one conversation
    pub fn entry(&self, key: &ConversationKey) -> Option<&DirectoryEntry> {
        self.entries.get(key)
    }

    /// Live listener keys
    pub fn watching(&self) -> Vec<WatchKey> {
        self.supervisor.keys().cloned().collect()
    }

    /// Whether a listener for `key` is live
    pub fn is_watching(&self, key: &WatchKey) -> bool {
        self.supervisor.is_live(key)
    }

    /// Cancel every listener
    pub fn stop(&mut self) {
        self.supervisor.cancel_all();
        debug!("Stopped watching directory of {}", self.me);
    }
}
