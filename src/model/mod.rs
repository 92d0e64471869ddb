//! Domain records and their persisted layout
//!
//! - `user` - participant profiles and username reservations
//! - `conversation` - conversation keys, metadata and directory entries
//! - `message` - messages and outgoing message composition
//! - `layout` - where each record lives in the document store
//! - `fields` - stored field names shared by writes and queries

pub mod conversation;
pub mod fields;
pub mod layout;
pub mod message;
pub mod user;

pub use conversation::{ConversationKey, ConversationMeta, DirectoryEntry};
pub use message::{Message, MessageKind, MessagePayload, OutgoingMessage, PHOTO_PREVIEW, VIDEO_PREVIEW};
pub use user::{UserProfile, UsernameReservation};
