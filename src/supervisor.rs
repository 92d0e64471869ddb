//! Keyed subscription supervision
//!
//! Every live listener the client holds (directory, profiles, conversation
//! metadata, message streams) is a forwarding task registered here under a
//! key. Attaching under a key that is already registered cancels the previous
//! task first, so at most one listener per key is ever alive.

use crate::store::Subscription;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Map from subscription key to the task forwarding it
#[derive(Debug)]
pub struct SubscriptionSupervisor<K: Eq + Hash> {
    live: HashMap<K, JoinHandle<()>>,
}

impl<K> SubscriptionSupervisor<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Empty supervisor
    pub fn new() -> Self {
        Self {
            live: HashMap::new(),
        }
    }

    /// Register `task` under `key`, cancelling whatever was there
    pub fn attach(&mut self, key: K, task: JoinHandle<()>) {
        if let Some(previous) = self.live.insert(key.clone(), task) {
            debug!("Replacing listener {:?}", key);
            previous.abort();
        }
    }

    /// Whether a listener for `key` is registered and still running
    pub fn is_live(&self, key: &K) -> bool {
        self.live
            .get(key)
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the listener for `key`; returns whether one was registered
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.live.remove(key) {
            Some(task) => {
                debug!("Cancelling listener {:?}", key);
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every listener whose key fails `keep`
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.live.retain(|key, task| {
            let kept = keep(key);
            if !kept {
                debug!("Cancelling listener {:?}", key);
                task.abort();
            }
            kept
        });
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) {
        for (_, task) in self.live.drain() {
            task.abort();
        }
    }

    /// Registered keys
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.live.keys()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl<K> Default for SubscriptionSupervisor<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for SubscriptionSupervisor<K> {
    fn drop(&mut self) {
        for (_, task) in self.live.drain() {
            task.abort();
        }
    }
}

/// Spawn a task pushing every snapshot of `sub` into `tx` as `wrap(snapshot)`
///
/// The task ends when the store closes the stream or the receiving side is
/// dropped. Aborting the task drops `sub`, which stops the store listener.
pub fn forward<T, E, F>(
    mut sub: Subscription<T>,
    tx: mpsc::UnboundedSender<E>,
    label: String,
    wrap: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> E + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(snapshot) = sub.next().await {
            if tx.send(wrap(snapshot)).is_err() {
                debug!("Receiver for {} is gone", label);
                return;
            }
        }
        debug!("Stream {} ended", label);
    })
}
