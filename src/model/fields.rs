//! Stored field names
//!
//! Records deserialize with `camelCase` names; writes and queries use these
//! constants so both sides agree.

/// `users/{id}.uid`
pub const UID: &str = "uid";
/// `users/{id}.fullName`
pub const FULL_NAME: &str = "fullName";
/// `users/{id}.username` (lowercase)
pub const USERNAME: &str = "username";
/// `users/{id}.email`
pub const EMAIL: &str = "email";
/// `users/{id}.avatarUrl`, also denormalized into directory entries
pub const AVATAR_URL: &str = "avatarUrl";
/// `users/{id}.online`
pub const ONLINE: &str = "online";
/// `users/{id}.lastSeen`
pub const LAST_SEEN: &str = "lastSeen";
/// `users/{id}.createdAt`, also on messages
pub const CREATED_AT: &str = "createdAt";
/// `users/{id}.lastUpdated`
pub const LAST_UPDATED: &str = "lastUpdated";

/// `chats/{key}.participants`
pub const PARTICIPANTS: &str = "participants";
/// `chats/{key}.lastMessage`
pub const LAST_MESSAGE: &str = "lastMessage";
/// `chats/{key}.lastActivityAt`, also on directory entries
pub const LAST_ACTIVITY_AT: &str = "lastActivityAt";

/// `userChats/{uid}/chats/{key}.otherId`
pub const OTHER_ID: &str = "otherId";

/// `messages/{id}.senderId`
pub const SENDER_ID: &str = "senderId";
/// `messages/{id}.read`
pub const READ: &str = "read";
/// `messages/{id}.type`
pub const KIND: &str = "type";
/// `messages/{id}.text`
pub const TEXT: &str = "text";
/// `messages/{id}.mediaUrl`
pub const MEDIA_URL: &str = "mediaUrl";
