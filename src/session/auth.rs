//! Identity provider boundary
//!
//! The sync core only needs a stable principal id and the sign-in/sign-out
//! lifecycle. [`MemoryAuth`] is a local provider with salted PBKDF2 password
//! hashes, used for embedding and tests.

use crate::{Error, Result};
use async_trait::async_trait;
use ring::{pbkdf2, rand::SecureRandom, rand::SystemRandom};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

fn pbkdf2_rounds() -> NonZeroU32 {
    NonZeroU32::new(10_000).unwrap_or(NonZeroU32::MIN)
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable user id
    pub uid: String,
    /// Sign-in email
    pub email: String,
}

/// External identity provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Currently signed-in principal
    fn current_principal(&self) -> Option<Principal>;

    /// Changes of the signed-in principal
    fn watch(&self) -> watch::Receiver<Option<Principal>>;

    /// Create an account and sign it in
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal>;

    /// Sign in with email and password
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal>;

    /// Sign out the current principal
    async fn sign_out(&self) -> Result<()>;

    /// Remove an account (compensating step of registration)
    async fn delete_account(&self, uid: &str) -> Result<()>;
}

struct Account {
    uid: String,
    salt: [u8; SALT_LEN],
    hash: [u8; HASH_LEN],
}

/// In-process identity provider
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: watch::Sender<Option<Principal>>,
    rng: SystemRandom,
    fail_deletes: AtomicBool,
}

impl MemoryAuth {
    /// Provider without accounts
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current,
            rng: SystemRandom::new(),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Make `delete_account` fail from now on
    #[cfg(test)]
    pub fn reject_deletes(&self, reject: bool) {
        self.fail_deletes.store(reject, Ordering::SeqCst);
    }

    /// Number of accounts
    pub async fn account_count(&self) -> usize {
        self.accounts.lock().await.len()
    }

    fn hash(&self, salt: &[u8], password: &str) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            pbkdf2_rounds(),
            salt,
            password.as_bytes(),
            &mut out,
        );
        out
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::Auth(format!("invalid email address: {}", email))),
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_principal(&self) -> Option<Principal> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Principal>> {
        self.current.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Principal> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::Auth(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(Error::Auth(format!("email already in use: {}", email)));
        }

        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| Error::Auth("failed to generate salt".to_string()))?;
        let hash = self.hash(&salt, password);

        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                salt,
                hash,
            },
        );

        let principal = Principal { uid, email };
        self.current.send_replace(Some(principal.clone()));
        info!("Created account {}", principal.uid);
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal> {
        let email = normalize_email(email)?;
        let accounts = self.accounts.lock().await;

        let account = accounts
            .get(&email)
            .ok_or_else(|| Error::Auth("invalid email or password".to_string()))?;

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            pbkdf2_rounds(),
            &account.salt,
            password.as_bytes(),
            &account.hash,
        )
        .map_err(|_| {
            warn!("Rejected sign-in for {}", email);
            Error::Auth("invalid email or password".to_string())
        })?;

        let principal = Principal {
            uid: account.uid.clone(),
            email,
        };
        self.current.send_replace(Some(principal.clone()));
        debug!("Signed in {}", principal.uid);
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(principal) = self.current.send_replace(None) {
            debug!("Signed out {}", principal.uid);
        }
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Auth(format!("account deletion rejected for {}", uid)));
        }

        let mut accounts = self.accounts.lock().await;
        accounts.retain(|_, account| account.uid != uid);

        let signed_in = self
            .current
            .borrow()
            .as_ref()
            .map(|p| p.uid == uid)
            .unwrap_or(false);
        if signed_in {
            self.current.send_replace(None);
        }
        info!("Deleted account {}", uid);
        Ok(())
    }
}
