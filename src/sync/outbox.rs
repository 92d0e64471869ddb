//! Sending messages
//!
//! A send is one atomic batch: the message itself plus the conversation
//! preview. Attachments are uploaded before the batch is built; a failed
//! upload writes nothing.

use crate::{
    model::{fields, layout, ConversationKey, MessageKind, OutgoingMessage},
    store::{FieldValue, Fields, SharedStore, Write, WriteBatch},
    upload::MediaUploader,
    Error, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Allows one outstanding send at a time
#[derive(Debug, Clone, Default)]
pub struct SendGate {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a send; releases the gate when dropped
#[derive(Debug)]
pub struct SendPermit {
    busy: Arc<AtomicBool>,
}

impl SendGate {
    /// Open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate
    ///
    /// # Errors
    /// `Error::SendInProgress` while another permit is alive
    pub fn try_acquire(&self) -> Result<SendPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SendInProgress)?;
        Ok(SendPermit {
            busy: self.busy.clone(),
        })
    }

    /// Whether a send is outstanding
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// What ends up in the message document
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Body {
    Text(String),
    Media { kind: MessageKind, url: String },
}

impl Body {
    fn preview(&self) -> String {
        match self {
            Body::Text(text) => text.clone(),
            Body::Media { kind, .. } => kind.preview_placeholder().unwrap_or_default().to_string(),
        }
    }
}

/// Message create plus metadata merge, as one batch
pub(crate) fn send_batch(
    key: &ConversationKey,
    me: &str,
    other: &str,
    message_id: &str,
    body: &Body,
) -> WriteBatch {
    let mut message = Fields::new()
        .with(fields::SENDER_ID, me)
        .with(fields::CREATED_AT, FieldValue::ServerTimestamp)
        .with(fields::READ, false);
    match body {
        Body::Text(text) => {
            message.set(fields::KIND, MessageKind::Text.as_str());
            message.set(fields::TEXT, text.as_str());
        }
        Body::Media { kind, url } => {
            message.set(fields::KIND, kind.as_str());
            message.set(fields::MEDIA_URL, url.as_str());
        }
    }

    let meta = Fields::new()
        .with(fields::PARTICIPANTS, vec![me.to_string(), other.to_string()])
        .with(fields::LAST_MESSAGE, body.preview())
        .with(fields::LAST_ACTIVITY_AT, FieldValue::ServerTimestamp);

    WriteBatch::new()
        .with(Write::create(layout::message(key, message_id), message))
        .with(Write::merge(layout::chat(key), meta))
}

/// Sends on behalf of one user; clones share the same [`SendGate`]
#[derive(Clone)]
pub struct MessageSender {
    store: SharedStore,
    uploader: Arc<dyn MediaUploader>,
    gate: SendGate,
    me: String,
}

impl MessageSender {
    /// Sender for `me`
    pub fn new(store: SharedStore, uploader: Arc<dyn MediaUploader>, me: impl Into<String>) -> Self {
        Self {
            store,
            uploader,
            gate: SendGate::new(),
            me: me.into(),
        }
    }

    /// Gate guarding this sender
    pub fn gate(&self) -> &SendGate {
        &self.gate
    }

    /// Send `outgoing` to `other` in conversation `key`; returns the new message id
    ///
    /// # Errors
    /// * `Error::SendInProgress` when another send from this sender is outstanding
    /// * `Error::UnsupportedMedia` for attachments that are not images or videos
    /// * `Error::Upload` when the attachment upload fails; nothing is written
    /// * `Error::Store` when the batch is rejected
    pub async fn send(
        &self,
        key: &ConversationKey,
        other: &str,
        outgoing: OutgoingMessage,
    ) -> Result<String> {
        let _permit = self.gate.try_acquire()?;

        let body = match outgoing {
            OutgoingMessage::Text(text) => {
                if text.trim().is_empty() {
                    return Err(Error::EmptyMessage);
                }
                Body::Text(text)
            }
            OutgoingMessage::Attachment(file) => {
                let kind = file.kind()?;
                let name = file.file_name.clone();
                let url = self.uploader.upload(file).await.map_err(|e| {
                    warn!("Attachment {} not sent: {}", name, e);
                    match e {
                        Error::Upload(_) => e,
                        other => Error::Upload(other.to_string()),
                    }
                })?;
                Body::Media { kind, url }
            }
        };

        let message_id = Uuid::new_v4().to_string();
        self.store
            .write_batch(send_batch(key, &self.me, other, &message_id, &body))
            .await?;

        info!("Sent message {} in {}", message_id, key);
        Ok(message_id)
    }
}
