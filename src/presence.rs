//! Presence flags
//!
//! Best effort: a client that crashes stays "online" until its next session
//! ends cleanly.

use crate::{
    model::{fields, layout},
    store::{FieldValue, Fields, SharedStore, Write, WriteBatch},
    Result,
};
use tracing::{debug, warn};

async fn set_presence(store: &SharedStore, uid: &str, online: bool) -> Result<()> {
    let update = Fields::new()
        .with(fields::ONLINE, online)
        .with(fields::LAST_SEEN, FieldValue::ServerTimestamp);

    let result = store
        .write_batch(WriteBatch::new().with(Write::merge(layout::user(uid), update)))
        .await;

    match result {
        Ok(()) => {
            debug!("{} is now {}", uid, if online { "online" } else { "offline" });
            Ok(())
        }
        Err(e) => {
            warn!("Failed to update presence of {}: {}", uid, e);
            Err(e.into())
        }
    }
}

/// Mark `uid` online and stamp `lastSeen`
pub async fn mark_online(store: &SharedStore, uid: &str) -> Result<()> {
    set_presence(store, uid, true).await
}

/// Mark `uid` offline and stamp `lastSeen`
pub async fn mark_offline(store: &SharedStore, uid: &str) -> Result<()> {
    set_presence(store, uid, false).await
}
