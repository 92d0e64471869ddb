//! Participant profiles

use serde::{Deserialize, Serialize};

/// Public profile at `users/{uid}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Stable identifier from the identity provider
    pub uid: String,
    /// Display name
    #[serde(default)]
    pub full_name: String,
    /// Unique handle, stored lowercase
    #[serde(default)]
    pub username: Option<String>,
    /// Sign-in email
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Presence flag (best effort)
    #[serde(default)]
    pub online: bool,
    /// Last presence change (epoch milliseconds)
    #[serde(default)]
    pub last_seen: Option<i64>,
    /// Registration time (epoch milliseconds)
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Last settings change (epoch milliseconds)
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl UserProfile {
    /// Minimal profile for a principal without a stored record
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    /// Avatar URL, or `fallback` when none is set
    pub fn avatar_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.avatar_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => fallback,
        }
    }
}

/// Reservation record at `usernames/{username}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameReservation {
    /// Owner of the username
    pub uid: String,
}
