//! Read-state reconciliation
//!
//! Whenever the viewer has the conversation open, messages from the other
//! participant that are still unread are flipped to read in one batch. The
//! flip is monotonic, so replaying it is harmless.

use crate::{
    model::{fields, layout, ConversationKey, Message},
    store::{Fields, SharedStore, Write, WriteBatch},
    Result,
};
use tracing::debug;

/// Ids of messages `me` has received but not yet read
pub fn plan_read_receipts(messages: &[Message], me: &str) -> Vec<String> {
    messages
        .iter()
        .filter(|m| !m.is_from(me) && !m.read)
        .map(|m| m.id.clone())
        .collect()
}

/// One batch marking `ids` read; updates fail on messages deleted meanwhile
pub fn read_receipt_batch(key: &ConversationKey, ids: &[String]) -> WriteBatch {
    ids.iter()
        .map(|id| {
            Write::update(
                layout::message(key, id),
                Fields::new().with(fields::READ, true),
            )
        })
        .collect()
}

/// Mark every unread incoming message read; returns how many were flipped
///
/// Nothing is written when there is nothing to flip.
pub async fn reconcile_reads(
    store: &SharedStore,
    key: &ConversationKey,
    messages: &[Message],
    me: &str,
) -> Result<usize> {
    let ids = plan_read_receipts(messages, me);
    if ids.is_empty() {
        return Ok(0);
    }

    store.write_batch(read_receipt_batch(key, &ids)).await?;
    debug!("Marked {} messages read in {}", ids.len(), key);
    Ok(ids.len())
}
