// Engine Tests - Testing conversation lifecycle, switching, reconciliation and deletion

use super::support::{
    doc, message_ids, pump_engine_until, seed_message, shared, FlakyStore, StaticUploader, WAIT,
};
use crate::model::{fields, layout, ConversationKey, Message, OutgoingMessage};
use crate::store::{MemoryStore, SharedStore, Write, WriteBatch};
use crate::sync::{plan_read_receipts, reconcile_reads, EngineState, SyncEngine, SyncEvent};
use crate::Error;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

fn engine_for(memory: &MemoryStore, me: &str) -> SyncEngine {
    SyncEngine::new(shared(memory), StaticUploader::new("https://cdn.test/x.png"), me)
}

#[tokio::test]
async fn test_open_moves_through_states() {
    let memory = MemoryStore::new();
    let mut engine = engine_for(&memory, "alice");
    assert_eq!(engine.state(), EngineState::Unloaded);

    let key = engine.open("bob").await.expect("Failed to open");
    assert_eq!(engine.state(), EngineState::Subscribing);
    assert_eq!(engine.current_key(), Some(&key));

    pump_engine_until(&mut engine, |e| e.state() == EngineState::Live).await;
    assert!(engine.messages().is_empty());

    engine.close();
    assert_eq!(engine.state(), EngineState::Closed);
    assert!(engine.current_key().is_none());
}

#[tokio::test]
async fn test_open_with_self_is_rejected() {
    let memory = MemoryStore::new();
    let mut engine = engine_for(&memory, "alice");

    assert!(matches!(engine.open("alice").await, Err(Error::SelfConversation)));
    assert_eq!(engine.state(), EngineState::Unloaded);
}

#[tokio::test]
async fn test_mirror_follows_store_order() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let key = ConversationKey::derive("alice", "bob");

    // Written out of timestamp order
    seed_message(&store, &key, "c", "bob", "third", 3_000, false).await;
    seed_message(&store, &key, "a", "bob", "first", 1_000, false).await;
    seed_message(&store, &key, "b", "alice", "second", 2_000, false).await;

    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    engine.open("bob").await.expect("Failed to open");
    pump_engine_until(&mut engine, |e| e.messages().len() == 3).await;

    let ids: Vec<&str> = engine.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    seed_message(&store, &key, "d", "bob", "between", 1_500, false).await;
    pump_engine_until(&mut engine, |e| e.messages().len() == 4).await;
    let ids: Vec<&str> = engine.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d", "b", "c"]);
}

#[tokio::test]
async fn test_stale_snapshot_after_switch_is_dropped() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let with_bob = ConversationKey::derive("alice", "bob");
    let with_carol = ConversationKey::derive("alice", "carol");
    seed_message(&store, &with_bob, "b1", "bob", "hi from bob", 1_000, false).await;
    seed_message(&store, &with_carol, "c1", "carol", "hi from carol", 1_000, false).await;

    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    engine.open("bob").await.expect("Failed to open bob");
    engine.open("carol").await.expect("Failed to open carol");

    // A snapshot tagged with the previous key arrives late
    let stale = SyncEvent::Snapshot {
        key: with_bob.clone(),
        generation: engine.generation() - 1,
        messages: vec![Message::text("b1", "bob", "hi from bob", Some(1_000))],
    };
    assert!(!engine.apply(stale));
    assert!(engine.messages().is_empty());

    pump_engine_until(&mut engine, |e| e.messages().len() == 1).await;
    assert_eq!(engine.messages()[0].id, "c1");

    // Writes to the old conversation never reach the mirror
    seed_message(&store, &with_bob, "b2", "bob", "still there?", 2_000, false).await;
    seed_message(&store, &with_carol, "c2", "carol", "yes", 2_000, false).await;
    pump_engine_until(&mut engine, |e| e.messages().len() == 2).await;

    sleep(Duration::from_millis(50)).await;
    loop {
        let next = timeout(Duration::from_millis(50), engine.next_event()).await;
        match next {
            Ok(Some(event)) => {
                engine.apply(event);
            }
            _ => break,
        }
    }
    let ids: Vec<&str> = engine.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(engine.current_key(), Some(&with_carol));
}

#[tokio::test]
async fn test_snapshot_from_earlier_open_of_same_conversation_is_dropped() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let with_bob = ConversationKey::derive("alice", "bob");
    seed_message(&store, &with_bob, "b1", "bob", "hi", 1_000, false).await;
    seed_message(&store, &with_bob, "b2", "bob", "bye", 2_000, true).await;

    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    engine.open("bob").await.expect("Failed to open bob");
    let first = engine.generation();
    engine.open("carol").await.expect("Failed to open carol");
    engine.open("bob").await.expect("Failed to reopen bob");
    assert!(engine.generation() > first);

    store
        .write_batch(WriteBatch::new().with(Write::delete(layout::message(&with_bob, "b1"))))
        .await
        .expect("Failed to delete");
    pump_engine_until(&mut engine, |e| e.messages().len() == 1).await;

    // Queued by the first listener before b1 was deleted
    let stale = SyncEvent::Snapshot {
        key: with_bob.clone(),
        generation: first,
        messages: vec![
            Message::text("b1", "bob", "hi", Some(1_000)),
            Message::text("b2", "bob", "bye", Some(2_000)),
        ],
    };
    assert!(!engine.apply(stale));
    let ids: Vec<&str> = engine.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["b2"]);
}

#[tokio::test]
async fn test_panicking_reconciliation_is_contained() {
    let memory = MemoryStore::new();
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let store: SharedStore = flaky.clone();
    let key = ConversationKey::derive("alice", "bob");
    seed_message(&store, &key, "in1", "bob", "one", 1_000, false).await;

    flaky.panic_on_write(true);
    let mut engine = SyncEngine::new(store.clone(), StaticUploader::new("https://cdn.test/x.png"), "alice");
    engine.open("bob").await.expect("Failed to open");
    pump_engine_until(&mut engine, |e| e.state() == EngineState::Live).await;

    timeout(WAIT, engine.settle_receipts())
        .await
        .expect("Timed out settling receipts");
    assert_eq!(engine.state(), EngineState::Live);
    assert!(!engine.messages()[0].read);
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let key = ConversationKey::derive("alice", "bob");
    seed_message(&store, &key, "in1", "bob", "one", 1_000, false).await;
    seed_message(&store, &key, "in2", "bob", "two", 2_000, false).await;
    seed_message(&store, &key, "own", "alice", "mine", 3_000, false).await;
    seed_message(&store, &key, "old", "bob", "seen", 500, true).await;

    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    engine.open("bob").await.expect("Failed to open");
    pump_engine_until(&mut engine, |e| e.messages().len() == 4).await;

    assert_eq!(plan_read_receipts(engine.messages(), "alice"), vec!["in1", "in2"]);
    let before = memory.committed_batches();
    assert_eq!(engine.reconcile_reads().await.expect("Failed to reconcile"), 2);
    assert_eq!(memory.committed_batches(), before + 1);

    for id in ["in1", "in2"] {
        let message = doc(&store, &layout::message(&key, id)).await.expect("Message missing");
        assert_eq!(message.field(fields::READ), Some(&json!(true)));
    }
    let own = doc(&store, &layout::message(&key, "own")).await.expect("Message missing");
    assert_eq!(own.field(fields::READ), Some(&json!(false)), "own messages stay unread");

    pump_engine_until(&mut engine, |e| {
        e.messages().iter().filter(|m| !m.is_from("alice")).all(|m| m.read)
    })
    .await;
    assert_eq!(engine.reconcile_reads().await.expect("Failed to reconcile"), 0);
    assert_eq!(memory.committed_batches(), before + 1, "second pass must not write");

    // Replaying the stale plan is harmless
    let stale = vec![
        Message::text("in1", "bob", "one", Some(1_000)),
        Message::text("in2", "bob", "two", Some(2_000)),
    ];
    reconcile_reads(&store, &key, &stale, "alice").await.expect("Replay failed");
    let message = doc(&store, &layout::message(&key, "in1")).await.expect("Message missing");
    assert_eq!(message.field(fields::READ), Some(&json!(true)));
}

#[tokio::test]
async fn test_auto_reconcile_after_push() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let key = ConversationKey::derive("alice", "bob");
    seed_message(&store, &key, "in1", "bob", "hello", 1_000, false).await;

    let mut engine = engine_for(&memory, "alice");
    engine.open("bob").await.expect("Failed to open");
    pump_engine_until(&mut engine, |e| !e.messages().is_empty()).await;
    timeout(WAIT, engine.settle_receipts()).await.expect("Reconciliation hung");

    let message = doc(&store, &layout::message(&key, "in1")).await.expect("Message missing");
    assert_eq!(message.field(fields::READ), Some(&json!(true)));

    pump_engine_until(&mut engine, |e| e.messages().iter().all(|m| m.read)).await;
}

#[tokio::test]
async fn test_delete_messages_removes_exact_set() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    let key = engine.open("bob").await.expect("Failed to open");

    for text in ["one", "two", "three", "four"] {
        engine
            .send(OutgoingMessage::Text(text.to_string()))
            .await
            .expect("Failed to send");
    }
    pump_engine_until(&mut engine, |e| e.messages().len() == 4).await;
    let meta_before = doc(&store, &layout::chat(&key)).await.expect("Metadata missing");

    let all: Vec<String> = engine.messages().iter().map(|m| m.id.clone()).collect();
    let doomed = vec![all[1].clone(), all[3].clone()];
    assert_eq!(engine.delete_messages(&doomed).await.expect("Failed to delete"), 2);

    let mut expected = vec![all[0].clone(), all[2].clone()];
    expected.sort();
    assert_eq!(message_ids(&store, &key).await, expected);

    let meta_after = doc(&store, &layout::chat(&key)).await.expect("Metadata missing");
    assert_eq!(meta_after, meta_before, "metadata must be untouched");
    assert_eq!(meta_after.field(fields::LAST_MESSAGE), Some(&json!("four")));

    pump_engine_until(&mut engine, |e| e.messages().len() == 2).await;
}

#[tokio::test]
async fn test_delete_nothing_writes_nothing() {
    let memory = MemoryStore::new();
    let mut engine = engine_for(&memory, "alice");
    engine.open("bob").await.expect("Failed to open");

    assert_eq!(engine.delete_messages(&[]).await.expect("Failed to delete"), 0);
    assert_eq!(engine.clear_conversation().await.expect("Failed to clear"), 0);
    assert_eq!(memory.committed_batches(), 0);
}

#[tokio::test]
async fn test_clear_conversation_keeps_metadata() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    let key = engine.open("bob").await.expect("Failed to open");

    engine.send(OutgoingMessage::Text("a".to_string())).await.expect("Failed to send");
    engine.send(OutgoingMessage::Text("b".to_string())).await.expect("Failed to send");
    seed_message(&store, &key, "x", "bob", "c", 1, false).await;

    assert_eq!(engine.clear_conversation().await.expect("Failed to clear"), 3);
    assert!(message_ids(&store, &key).await.is_empty());

    let meta = doc(&store, &layout::chat(&key)).await.expect("Metadata missing");
    assert_eq!(meta.field(fields::LAST_MESSAGE), Some(&json!("b")));
    assert_eq!(meta.field(fields::PARTICIPANTS), Some(&json!(["alice", "bob"])));
}

#[tokio::test]
async fn test_delete_selected_clears_selection() {
    let memory = MemoryStore::new();
    let store = shared(&memory);
    let mut engine = engine_for(&memory, "alice");
    engine.set_auto_reconcile(false);
    let key = engine.open("bob").await.expect("Failed to open");
    seed_message(&store, &key, "m1", "bob", "one", 1_000, false).await;
    seed_message(&store, &key, "m2", "bob", "two", 2_000, false).await;
    pump_engine_until(&mut engine, |e| e.messages().len() == 2).await;

    engine.selection_mut().toggle("m1");
    assert!(engine.selection().is_empty(), "toggle outside delete mode is ignored");

    engine.selection_mut().enable();
    engine.selection_mut().toggle("m1");
    assert_eq!(engine.delete_selected().await.expect("Failed to delete"), 1);

    assert!(!engine.selection().is_enabled());
    assert_eq!(message_ids(&store, &key).await, vec!["m2"]);
}

#[tokio::test]
async fn test_operations_need_an_open_conversation() {
    let memory = MemoryStore::new();
    let engine = engine_for(&memory, "alice");

    assert!(matches!(
        engine.send(OutgoingMessage::Text("hi".to_string())).await,
        Err(Error::NoConversation)
    ));
    assert!(matches!(engine.clear_conversation().await, Err(Error::NoConversation)));
    assert!(matches!(engine.reconcile_reads().await, Err(Error::NoConversation)));
}
