// Conversation Key Tests - Testing key derivation and the persisted layout

use crate::model::{layout, ConversationKey, ConversationMeta};
use crate::Error;
use std::collections::HashSet;

#[test]
fn test_key_is_symmetric() {
    let pairs = [
        ("alice", "bob"),
        ("Zed", "amy"),
        ("u1", "u10"),
        ("", "x"),
        ("7Ht2kPq", "9aB3mNc"),
    ];

    for (a, b) in pairs {
        assert_eq!(
            ConversationKey::derive(a, b),
            ConversationKey::derive(b, a),
            "key for ({}, {}) should not depend on order",
            a,
            b
        );
    }
}

#[test]
fn test_key_puts_greater_id_first() {
    assert_eq!(ConversationKey::derive("alice", "bob").as_str(), "bob_alice");
    assert_eq!(ConversationKey::derive("bob", "alice").as_str(), "bob_alice");
    // Byte order: uppercase sorts before lowercase
    assert_eq!(ConversationKey::derive("Bob", "alice").as_str(), "alice_Bob");
}

#[test]
fn test_key_is_injective_for_ids_without_separator() {
    let ids = ["a", "b", "c", "ab", "ba", "abc", "x9", "X9"];
    let mut seen = HashSet::new();
    let mut pairs = 0;

    for (i, a) in ids.iter().enumerate() {
        for b in ids.iter().skip(i + 1) {
            pairs += 1;
            assert!(
                seen.insert(ConversationKey::derive(a, b)),
                "distinct pair ({}, {}) produced a duplicate key",
                a,
                b
            );
        }
    }
    assert_eq!(seen.len(), pairs);
}

#[test]
fn test_for_pair_rejects_self_conversation() {
    let result = ConversationKey::for_pair("alice", "alice");
    assert!(matches!(result, Err(Error::SelfConversation)));

    let key = ConversationKey::for_pair("alice", "bob").expect("Failed to derive key");
    assert_eq!(key, ConversationKey::derive("alice", "bob"));
}

#[test]
fn test_key_serializes_as_plain_string() {
    let key = ConversationKey::derive("alice", "bob");
    let json = serde_json::to_string(&key).expect("Failed to serialize");
    assert_eq!(json, "\"bob_alice\"");
    assert_eq!(key.to_string(), "bob_alice");
}

#[test]
fn test_other_participant_comes_from_metadata() {
    let meta = ConversationMeta {
        participants: vec!["a_b".to_string(), "c".to_string()],
        ..ConversationMeta::default()
    };
    assert_eq!(meta.other_participant("c"), Some("a_b"));
    assert_eq!(meta.other_participant("a_b"), Some("c"));
}

#[test]
fn test_layout_paths() {
    let key = ConversationKey::derive("alice", "bob");

    assert_eq!(layout::user("alice").to_string(), "users/alice");
    assert_eq!(layout::username("alice").to_string(), "usernames/alice");
    assert_eq!(layout::chat(&key).to_string(), "chats/bob_alice");
    assert_eq!(
        layout::message(&key, "m1").to_string(),
        "chats/bob_alice/messages/m1"
    );
    assert_eq!(
        layout::directory_entry("alice", &key).to_string(),
        "userChats/alice/chats/bob_alice"
    );
}
