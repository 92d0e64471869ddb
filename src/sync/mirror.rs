//! Ordered local mirror of a message stream

use crate::{model::Message, store::Document};
use std::cmp::Ordering;
use tracing::warn;

/// Order by commit time; unresolved timestamps go last. Equal keys keep delivery order.
fn by_commit_time(a: &Message, b: &Message) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Decode message documents, skipping unreadable ones
pub fn decode_messages(docs: &[Document]) -> Vec<Message> {
    docs.iter()
        .filter_map(|doc| match Message::from_document(doc) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping unreadable message {}: {}", doc.path, e);
                None
            }
        })
        .collect()
}

/// Local copy of one conversation's messages, replaced wholesale on every push
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    messages: Vec<Message>,
}

impl Mirror {
    /// Empty mirror
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a delivered snapshot
    pub fn replace(&mut self, mut messages: Vec<Message>) {
        // sort_by is stable
        messages.sort_by(by_commit_time);
        self.messages = messages;
    }

    /// Messages in display order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Message by id
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether a message with `id` is mirrored
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Ids in display order
    pub fn ids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.id.clone()).collect()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the mirror is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
