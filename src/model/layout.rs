//! Persisted layout
//!
//! ```text
//! users/{uid}
//! usernames/{lowercase username}            -> { uid }
//! chats/{key}                               -> { participants, lastMessage, lastActivityAt }
//! chats/{key}/messages/{message id}
//! userChats/{uid}/chats/{key}               -> { otherId, fullName, avatarUrl, lastActivityAt }
//! ```

use crate::model::ConversationKey;
use crate::store::{CollectionPath, DocPath};

/// `users`
pub fn users() -> CollectionPath {
    CollectionPath::root("users")
}

/// `users/{uid}`
pub fn user(uid: &str) -> DocPath {
    users().doc(uid)
}

/// `usernames/{username}`
pub fn username(normalized: &str) -> DocPath {
    CollectionPath::root("usernames").doc(normalized)
}

/// `chats/{key}`
pub fn chat(key: &ConversationKey) -> DocPath {
    CollectionPath::root("chats").doc(key.as_str())
}

/// `chats/{key}/messages`
pub fn messages(key: &ConversationKey) -> CollectionPath {
    chat(key).collection("messages")
}

/// `chats/{key}/messages/{id}`
pub fn message(key: &ConversationKey, id: &str) -> DocPath {
    messages(key).doc(id)
}

/// `userChats/{uid}/chats`
pub fn directory(uid: &str) -> CollectionPath {
    CollectionPath::root("userChats").doc(uid).collection("chats")
}

/// `userChats/{uid}/chats/{key}`
pub fn directory_entry(uid: &str, key: &ConversationKey) -> DocPath {
    directory(uid).doc(key.as_str())
}
