//! Messages and outgoing message composition

use crate::{
    store::{Document, StoreResult},
    upload::MediaFile,
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation preview written for an image message
pub const PHOTO_PREVIEW: &str = "📷 Photo";
/// Conversation preview written for a video message
pub const VIDEO_PREVIEW: &str = "🎥 Video";

/// How a message payload is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text
    #[default]
    Text,
    /// Image at `media_url`
    Image,
    /// Video at `media_url`
    Video,
}

impl MessageKind {
    /// Stored name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
        }
    }

    /// Media kind for a MIME type: `image/*` or `video/*`
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let major = content_type.split('/').next()?.trim().to_ascii_lowercase();
        match major.as_str() {
            "image" => Some(MessageKind::Image),
            "video" => Some(MessageKind::Video),
            _ => None,
        }
    }

    /// Fixed conversation preview for media kinds
    pub fn preview_placeholder(&self) -> Option<&'static str> {
        match self {
            MessageKind::Text => None,
            MessageKind::Image => Some(PHOTO_PREVIEW),
            MessageKind::Video => Some(VIDEO_PREVIEW),
        }
    }
}

/// Stored message at `chats/{key}/messages/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Document id (not stored as a field)
    #[serde(skip)]
    pub id: String,
    /// Author
    pub sender_id: String,
    /// Server commit time (epoch milliseconds)
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Whether the recipient has seen it
    #[serde(default)]
    pub read: bool,
    /// Render mode; records written before media support default to text
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    /// Text content for text messages
    #[serde(default)]
    pub text: Option<String>,
    /// Durable URL for media messages
    #[serde(default)]
    pub media_url: Option<String>,
}

/// Borrowed view of what a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePayload<'a> {
    /// Text body
    Text(&'a str),
    /// Image or video reference
    Media {
        /// Image or video
        kind: MessageKind,
        /// Durable URL
        url: &'a str,
    },
    /// Record lacks the field its kind requires
    Missing,
}

impl Message {
    /// Text message
    pub fn text(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        created_at: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            created_at,
            read: false,
            kind: MessageKind::Text,
            text: Some(text.into()),
            media_url: None,
        }
    }

    /// Media message
    pub fn media(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        kind: MessageKind,
        url: impl Into<String>,
        created_at: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            created_at,
            read: false,
            kind,
            text: None,
            media_url: Some(url.into()),
        }
    }

    /// Decode a message document, taking the id from its path
    pub fn from_document(doc: &Document) -> StoreResult<Self> {
        let mut message: Message = doc.decode()?;
        message.id = doc.id().to_string();
        Ok(message)
    }

    /// Whether `uid` wrote this message
    pub fn is_from(&self, uid: &str) -> bool {
        self.sender_id == uid
    }

    /// Commit time as UTC
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// What to render
    pub fn payload(&self) -> MessagePayload<'_> {
        match self.kind {
            MessageKind::Text => match &self.text {
                Some(text) => MessagePayload::Text(text),
                None => MessagePayload::Missing,
            },
            kind => match &self.media_url {
                Some(url) => MessagePayload::Media { kind, url },
                None => MessagePayload::Missing,
            },
        }
    }
}

/// What the user is about to send
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    /// Text, written verbatim
    Text(String),
    /// File to upload first, then reference by URL
    Attachment(MediaFile),
}

impl OutgoingMessage {
    /// Build from the input box: an attachment wins over text
    ///
    /// # Errors
    /// `Error::EmptyMessage` when the text is blank and no file is attached
    pub fn compose(text: &str, attachment: Option<MediaFile>) -> Result<Self> {
        if let Some(file) = attachment {
            return Ok(OutgoingMessage::Attachment(file));
        }
        if text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        Ok(OutgoingMessage::Text(text.to_string()))
    }
}
