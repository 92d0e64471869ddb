//! Conversation keys, shared metadata and per-user directory entries

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the two participant ids of a key
pub const KEY_SEPARATOR: char = '_';

/// Canonical identifier of a two-party conversation.
///
/// `derive(a, b) == derive(b, a)`: the greater id comes first, then
/// [`KEY_SEPARATOR`], then the lesser id. Both clients compute the same key
/// and so resolve to the same `chats/{key}` record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the key for a pair of participant ids
    ///
    /// Total and pure. Self-pairs are rejected by [`ConversationKey::for_pair`].
    pub fn derive(a: &str, b: &str) -> Self {
        let (greater, lesser) = if a > b { (a, b) } else { (b, a) };
        Self(format!("{}{}{}", greater, KEY_SEPARATOR, lesser))
    }

    /// Key for a conversation between the signed-in user and someone else
    ///
    /// # Errors
    /// `Error::SelfConversation` when both ids are equal
    pub fn for_pair(me: &str, other: &str) -> Result<Self> {
        if me == other {
            return Err(Error::SelfConversation);
        }
        Ok(Self::derive(me, other))
    }

    /// Wrap a key read back from the store (directory entry id)
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared record at `chats/{key}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMeta {
    /// Both participant ids
    #[serde(default)]
    pub participants: Vec<String>,
    /// Preview of the latest message ("" until the first send)
    #[serde(default)]
    pub last_message: String,
    /// Commit time of the latest activity (epoch milliseconds)
    #[serde(default)]
    pub last_activity_at: Option<i64>,
}

impl ConversationMeta {
    /// The participant that is not `me`
    pub fn other_participant(&self, me: &str) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != me)
    }
}

/// Per-user pointer at `userChats/{uid}/chats/{key}`
///
/// Carries denormalized display fields of the other participant so a list can
/// render before the live profile arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// The other participant
    pub other_id: String,
    /// Their name when the entry was written
    #[serde(default)]
    pub full_name: String,
    /// Their avatar when the entry was written
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Commit time of the write that created or refreshed the entry
    #[serde(default)]
    pub last_activity_at: Option<i64>,
}

impl DirectoryEntry {
    /// Avatar URL, or `fallback` when none was recorded
    pub fn avatar_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.avatar_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => fallback,
        }
    }
}
