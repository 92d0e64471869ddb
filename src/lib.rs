//! Pookie Chat - realtime direct-messaging core
//!
//! This library provides the synchronization core of a two-party chat client:
//! canonical conversation keys, the per-user conversation directory, live
//! message mirrors with read receipts, and the write composition that keeps
//! conversation metadata consistent on top of a realtime document store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod config;
pub mod directory;
pub mod model;
pub mod presence;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod sync;
pub mod upload;

#[cfg(test)]
mod tests;

pub use store::StoreError;

/// Result type alias for Pookie Chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Pookie Chat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sign-in, sign-up or sign-out rejected by the identity provider
    #[error("Authentication error: {0}")]
    Auth(String),

    /// An operation needs a signed-in principal
    #[error("Not signed in")]
    NotSignedIn,

    /// Username is malformed
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Username is already reserved by another account
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Registration failed and the compensating account deletion failed too
    #[error("Registration for {uid} left a partial account ({cause}); cleanup failed: {cleanup}")]
    PartialRegistration {
        /// Principal that could not be removed
        uid: String,
        /// Error that aborted the registration
        cause: String,
        /// Error returned by the compensating delete
        cleanup: String,
    },

    /// Both participants of a conversation are the same user
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,

    /// Outgoing message has neither text nor attachment
    #[error("Message is empty")]
    EmptyMessage,

    /// A send from the same input is still outstanding
    #[error("A message is already being sent")]
    SendInProgress,

    /// Attachment is neither an image nor a video
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Operation requires an open conversation
    #[error("No conversation is open")]
    NoConversation,

    /// Media upload failed; nothing was written
    #[error("Upload error: {0}")]
    Upload(String),

    /// Document store rejected a read or write
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Settings file error
    #[error("Storage error: {0}")]
    Storage(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Initialize the Pookie Chat library with logging
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it twice is harmless.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
