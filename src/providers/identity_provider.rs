use async_trait::async_trait;
use bcrypt::{DEFAULT_COST, hash, verify};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::models::auth::AuthUser;

/// Error codes reported by the identity provider, mirroring the hosted
/// service's `auth/*` code namespace.
pub mod codes {
    pub const EMAIL_ALREADY_IN_USE: &str = "auth/email-already-in-use";
    pub const WEAK_PASSWORD: &str = "auth/weak-password";
    pub const USER_NOT_FOUND: &str = "auth/user-not-found";
    pub const WRONG_PASSWORD: &str = "auth/wrong-password";
    pub const INTERNAL_ERROR: &str = "auth/internal-error";
}

/// Coded failure from the identity service. The original backend code is
/// preserved so callers can branch on it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Callback invoked with the new auth state on every sign-in/sign-out
/// transition.
pub type AuthListener = Box<dyn Fn(Option<AuthUser>) + Send + Sync>;

/// Trait defining identity provider operations
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a new account and sign it in
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ProviderError>;

    /// Authenticate an existing account and sign it in
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    /// Invalidate the local session
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Currently signed-in user, readable without a network round trip
    fn current_user(&self) -> Option<AuthUser>;

    /// Bearer token for the current user, or `None` when unauthenticated.
    /// `force_refresh` reissues the token instead of using a cached one.
    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>, ProviderError>;

    /// Register an auth-state listener; dropping the returned subscription
    /// stops further invocations
    fn subscribe(&self, listener: AuthListener) -> AuthSubscription;
}

type SharedListener = Arc<dyn Fn(Option<AuthUser>) + Send + Sync>;
type ListenerMap = Arc<Mutex<HashMap<u64, SharedListener>>>;

/// Shared auth-state listener bookkeeping for provider implementations.
///
/// Callbacks are dispatched outside the registry lock, so a listener may
/// subscribe or unsubscribe from within its own callback; listeners added
/// during a dispatch are first invoked on the next transition.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    next_id: Arc<AtomicU64>,
    listeners: ListenerMap,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener and hand back its unsubscribe handle
    pub fn add(&self, listener: AuthListener) -> AuthSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::from(listener));
        AuthSubscription {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Invoke every registered listener with the new auth state
    pub fn notify(&self, user: Option<&AuthUser>) {
        let snapshot: Vec<SharedListener> = {
            let listeners = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            listeners.values().cloned().collect()
        };
        for listener in snapshot {
            listener(user.cloned());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle to a registered auth-state listener. Dropping it (or calling
/// [`AuthSubscription::unsubscribe`]) removes the listener so it is never
/// invoked again and the registration does not leak.
pub struct AuthSubscription {
    id: u64,
    listeners: ListenerMap,
}

impl AuthSubscription {
    /// Explicitly stop the subscription; equivalent to dropping it
    pub fn unsubscribe(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

/// In-memory identity provider for tests and local development.
///
/// Accounts live for the lifetime of the provider; passwords are stored
/// bcrypt-hashed and tokens are opaque strings cached per user until a
/// forced refresh or sign-out.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<AuthUser>>,
    cached_token: Mutex<Option<String>>,
    listeners: ListenerRegistry,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_current(&self, user: Option<AuthUser>) {
        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = user.clone();
        *self
            .cached_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.listeners.notify(user.as_ref());
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ProviderError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProviderError::new(
                codes::WEAK_PASSWORD,
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        let password_hash = hash(password, DEFAULT_COST).map_err(|e| {
            ProviderError::new(codes::INTERNAL_ERROR, format!("Password hashing failed: {e}"))
        })?;

        let user = {
            let mut accounts = self
                .accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if accounts.contains_key(email) {
                return Err(ProviderError::new(
                    codes::EMAIL_ALREADY_IN_USE,
                    "Email already in use",
                ));
            }

            let account = Account {
                uid: Uuid::new_v4().to_string(),
                email: email.to_string(),
                password_hash,
            };
            let user = AuthUser {
                uid: account.uid.clone(),
                email: account.email.clone(),
            };
            accounts.insert(email.to_string(), account);
            user
        };

        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let user = {
            let accounts = self
                .accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let account = accounts
                .get(email)
                .ok_or_else(|| ProviderError::new(codes::USER_NOT_FOUND, "No account for email"))?;

            let is_valid = verify(password, &account.password_hash).map_err(|e| {
                ProviderError::new(
                    codes::INTERNAL_ERROR,
                    format!("Password verification failed: {e}"),
                )
            })?;
            if !is_valid {
                return Err(ProviderError::new(codes::WRONG_PASSWORD, "Wrong password"));
            }

            AuthUser {
                uid: account.uid.clone(),
                email: account.email.clone(),
            }
        };

        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let is_signed_in = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if is_signed_in {
            self.set_current(None);
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>, ProviderError> {
        if self.current_user().is_none() {
            return Ok(None);
        }

        let mut cached = self
            .cached_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if force_refresh || cached.is_none() {
            *cached = Some(Uuid::new_v4().simple().to_string());
        }
        Ok(cached.clone())
    }

    fn subscribe(&self, listener: AuthListener) -> AuthSubscription {
        self.listeners.add(listener)
    }
}
