//! Accounts: registration, username reservation, search and profile settings
//!
//! Usernames are unique through a reservation document at
//! `usernames/{username}`. Registration writes the reservation with
//! create-only semantics in the same batch as the profile, so two clients
//! racing for one name cannot both win. The identity account is created
//! before that batch; when the batch fails, the account is deleted again.

use crate::{
    model::{fields, layout, UserProfile},
    session::AuthProvider,
    store::{Direction, FieldValue, Fields, Query, SharedStore, StoreError, Write, WriteBatch},
    upload::{MediaFile, MediaUploader},
    Error, Result,
};
use tracing::{debug, info, warn};

/// Shortest accepted username
pub const USERNAME_MIN_LEN: usize = 3;
/// Longest accepted username
pub const USERNAME_MAX_LEN: usize = 20;
/// Maximum number of search results
pub const SEARCH_LIMIT: usize = 20;

/// Canonical form of a username: trimmed, lowercase, `[a-z0-9_.]{3,20}`
///
/// # Errors
/// `Error::InvalidUsername` when the result has the wrong length or characters
pub fn normalize_username(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    let len = name.chars().count();

    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(Error::InvalidUsername(format!(
            "{} must be {}-{} characters",
            raw.trim(),
            USERNAME_MIN_LEN,
            USERNAME_MAX_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err(Error::InvalidUsername(format!(
            "{} may only contain letters, digits, '_' and '.'",
            raw.trim()
        )));
    }
    Ok(name)
}

/// Whether `raw` is a valid username nobody has reserved
pub async fn username_available(store: &SharedStore, raw: &str) -> Result<bool> {
    let name = normalize_username(raw)?;
    Ok(store.get(&layout::username(&name)).await?.is_none())
}

/// Read a profile
pub async fn load_profile(store: &SharedStore, uid: &str) -> Result<Option<UserProfile>> {
    match store.get(&layout::user(uid)).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Sign-up input
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationForm {
    /// Display name
    pub full_name: String,
    /// Requested username, any case
    pub username: String,
    /// Sign-in email
    pub email: String,
    /// Password
    pub password: String,
}

/// Register a new user
///
/// 1. validate and pre-check the username
/// 2. create the identity account
/// 3. one batch: create `usernames/{name}`, write `users/{uid}`
/// 4. if the batch fails, delete the identity account
///
/// # Errors
/// * `Error::InvalidUsername` / `Error::UsernameTaken` before anything is created
/// * `Error::Auth` when the identity provider rejects the account
/// * `Error::UsernameTaken` when another client reserved the name first
/// * `Error::Store` for other batch failures
/// * `Error::PartialRegistration` when the cleanup delete fails as well
pub async fn register(
    store: &SharedStore,
    auth: &dyn AuthProvider,
    form: RegistrationForm,
) -> Result<UserProfile> {
    let username = normalize_username(&form.username)?;
    if !username_available(store, &username).await? {
        return Err(Error::UsernameTaken(username));
    }

    let principal = auth.create_account(&form.email, &form.password).await?;

    let profile = Fields::new()
        .with(fields::UID, principal.uid.as_str())
        .with(fields::FULL_NAME, form.full_name.trim())
        .with(fields::USERNAME, username.as_str())
        .with(fields::EMAIL, principal.email.as_str())
        .with(fields::AVATAR_URL, None::<String>)
        .with(fields::ONLINE, true)
        .with(fields::LAST_SEEN, FieldValue::ServerTimestamp)
        .with(fields::CREATED_AT, FieldValue::ServerTimestamp)
        .with(fields::LAST_UPDATED, FieldValue::ServerTimestamp);

    let batch = WriteBatch::new()
        .with(Write::create(
            layout::username(&username),
            Fields::new().with(fields::UID, principal.uid.as_str()),
        ))
        .with(Write::overwrite(layout::user(&principal.uid), profile));

    if let Err(e) = store.write_batch(batch).await {
        let cause = match e {
            StoreError::Conflict(_) => Error::UsernameTaken(username.clone()),
            other => Error::Store(other),
        };
        warn!("Registration of {} failed: {}", username, cause);

        return match auth.delete_account(&principal.uid).await {
            Ok(()) => Err(cause),
            Err(cleanup) => Err(Error::PartialRegistration {
                uid: principal.uid,
                cause: cause.to_string(),
                cleanup: cleanup.to_string(),
            }),
        };
    }

    info!("Registered {} as {}", principal.uid, username);
    let stored = load_profile(store, &principal.uid).await?;
    Ok(stored.unwrap_or_else(|| UserProfile {
        full_name: form.full_name.trim().to_string(),
        username: Some(username),
        email: Some(principal.email.clone()),
        online: true,
        ..UserProfile::new(principal.uid.clone())
    }))
}

/// Users whose username starts with `prefix`, excluding `me`
pub async fn search_users(store: &SharedStore, prefix: &str, me: &str) -> Result<Vec<UserProfile>> {
    let prefix = prefix.trim().trim_start_matches('@').to_lowercase();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }

    let query = Query::new(layout::users())
        .where_prefix(fields::USERNAME, &prefix)
        .order_by(fields::USERNAME, Direction::Ascending)
        .limit(SEARCH_LIMIT + 1);

    let mut found = Vec::new();
    for doc in store.get_once(&query).await? {
        match doc.decode::<UserProfile>() {
            Ok(profile) if profile.uid != me => found.push(profile),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable profile {}: {}", doc.path, e),
        }
    }
    found.truncate(SEARCH_LIMIT);
    debug!("Search for {:?} found {} users", prefix, found.len());
    Ok(found)
}

/// Profile settings change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    /// New display name
    pub full_name: Option<String>,
    /// New avatar image, uploaded before anything is written
    pub avatar: Option<MediaFile>,
}

/// Apply a profile settings change and return the stored profile
///
/// # Errors
/// * `Error::UnsupportedMedia` when the avatar is not an image
/// * `Error::Upload` when the avatar upload fails; nothing is written
/// * `Error::Store` when the write is rejected
pub async fn update_profile(
    store: &SharedStore,
    uploader: &dyn MediaUploader,
    uid: &str,
    update: ProfileUpdate,
) -> Result<UserProfile> {
    let mut changes = Fields::new().with(fields::LAST_UPDATED, FieldValue::ServerTimestamp);

    if let Some(name) = update.full_name {
        changes.set(fields::FULL_NAME, name.trim());
    }

    if let Some(file) = update.avatar {
        if !file.is_image() {
            return Err(Error::UnsupportedMedia(file.content_type));
        }
        let url = uploader.upload(file).await?;
        changes.set(fields::AVATAR_URL, url);
    }

    store
        .write_batch(WriteBatch::new().with(Write::merge(layout::user(uid), changes)))
        .await?;
    info!("Updated profile of {}", uid);

    load_profile(store, uid)
        .await?
        .ok_or_else(|| Error::Store(StoreError::NotFound(layout::user(uid).to_string())))
}
