//! Signed-in session
//!
//! A [`SessionContext`] exists exactly between sign-in and sign-out. Every
//! component that needs the current user receives it from the context instead
//! of reading global state.

pub mod auth;

pub use auth::{AuthProvider, MemoryAuth, Principal};

use crate::{
    account::{self, ProfileUpdate},
    config::Settings,
    directory::{self, DirectoryWatcher},
    model::{layout, ConversationKey, UserProfile},
    presence,
    store::{SharedStore, SqliteStore, StoreError},
    sync::SyncEngine,
    upload::{HttpUploader, MediaUploader},
    Error, Result,
};
use std::sync::Arc;
use tracing::{info, warn};

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Realtime document store
    pub store: SharedStore,
    /// Identity provider
    pub auth: Arc<dyn AuthProvider>,
    /// Media upload endpoint
    pub uploader: Arc<dyn MediaUploader>,
}

impl Collaborators {
    /// Bundle explicit collaborators
    pub fn new(
        store: SharedStore,
        auth: Arc<dyn AuthProvider>,
        uploader: Arc<dyn MediaUploader>,
    ) -> Self {
        Self {
            store,
            auth,
            uploader,
        }
    }

    /// SQLite store at `settings.database_path` and the configured HTTP uploader
    pub fn from_settings(settings: &Settings, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let store = SqliteStore::open(&settings.database_path)?;
        let uploader = HttpUploader::new(&settings.upload)?;
        Ok(Self::new(Arc::new(store), auth, Arc::new(uploader)))
    }
}

/// Context of one signed-in user
pub struct SessionContext {
    collaborators: Collaborators,
    settings: Settings,
    principal: Principal,
    profile: UserProfile,
}

impl SessionContext {
    /// Sign in and establish a session
    ///
    /// # Errors
    /// `Error::Auth` when the credentials are rejected
    pub async fn sign_in(
        collaborators: Collaborators,
        settings: Settings,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        let principal = collaborators.auth.sign_in(email, password).await?;
        Self::establish(collaborators, settings, principal).await
    }

    /// Resume the session of an already signed-in principal
    pub async fn restore(collaborators: Collaborators, settings: Settings) -> Result<Option<Self>> {
        match collaborators.auth.current_principal() {
            Some(principal) => Ok(Some(Self::establish(collaborators, settings, principal).await?)),
            None => Ok(None),
        }
    }

    /// Build the context for `principal` and mark it online
    ///
    /// Presence is best effort and never fails the sign-in.
    pub async fn establish(
        collaborators: Collaborators,
        settings: Settings,
        principal: Principal,
    ) -> Result<Self> {
        if let Err(e) = presence::mark_online(&collaborators.store, &principal.uid).await {
            warn!("Continuing sign-in of {} without presence: {}", principal.uid, e);
        }

        let profile = account::load_profile(&collaborators.store, &principal.uid)
            .await?
            .unwrap_or_else(|| UserProfile {
                email: Some(principal.email.clone()),
                ..UserProfile::new(principal.uid.clone())
            });

        info!("Session started for {}", principal.uid);
        Ok(Self {
            collaborators,
            settings,
            principal,
            profile,
        })
    }

    /// Signed-in principal
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Signed-in user id
    pub fn uid(&self) -> &str {
        &self.principal.uid
    }

    /// Own profile as last loaded
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Own avatar, or the configured default
    pub fn avatar_url(&self) -> &str {
        self.profile.avatar_or(&self.settings.default_avatar_url)
    }

    /// Settings the session was started with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shared store handle
    pub fn store(&self) -> &SharedStore {
        &self.collaborators.store
    }

    /// Reload the own profile from the store
    pub async fn refresh_profile(&mut self) -> Result<&UserProfile> {
        if let Some(profile) = account::load_profile(self.store(), self.uid()).await? {
            self.profile = profile;
        }
        Ok(&self.profile)
    }

    /// Message engine for this user
    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.collaborators.store.clone(),
            self.collaborators.uploader.clone(),
            self.uid(),
        )
    }

    /// Live conversation list for this user
    pub async fn directory(&self) -> Result<DirectoryWatcher> {
        DirectoryWatcher::start(
            self.collaborators.store.clone(),
            self.uid(),
            self.settings.preview_max_chars,
            self.settings.default_avatar_url.as_str(),
        )
        .await
    }

    /// Start the conversation with `other_uid`
    pub async fn start_chat(&self, other_uid: &str) -> Result<ConversationKey> {
        if other_uid == self.uid() {
            return Err(Error::SelfConversation);
        }
        let other = account::load_profile(self.store(), other_uid)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound(layout::user(other_uid).to_string())))?;
        directory::start_chat(self.store(), &self.profile, &other).await
    }

    /// Find other users by username prefix
    pub async fn search_users(&self, prefix: &str) -> Result<Vec<UserProfile>> {
        account::search_users(self.store(), prefix, self.uid()).await
    }

    /// Change the own profile
    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<&UserProfile> {
        let profile = account::update_profile(
            &self.collaborators.store,
            self.collaborators.uploader.as_ref(),
            &self.principal.uid,
            update,
        )
        .await?;
        self.profile = profile;
        Ok(&self.profile)
    }

    /// Mark offline, then sign out; the context is consumed
    pub async fn sign_out(self) -> Result<()> {
        if let Err(e) = presence::mark_offline(&self.collaborators.store, self.uid()).await {
            warn!("Signing out {} without presence update: {}", self.uid(), e);
        }
        self.collaborators.auth.sign_out().await?;
        info!("Session ended for {}", self.principal.uid);
        Ok(())
    }
}
