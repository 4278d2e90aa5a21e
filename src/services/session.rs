use log::debug;
use std::sync::Arc;

use crate::models::auth::AuthUser;
use crate::providers::identity_provider::{
    AuthSubscription, IdentityProvider, ProviderError,
};

/// Normalized identity-service failure. The backend's original error code
/// is preserved so callers can branch on it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({code})")]
pub struct AuthError {
    pub code: String,
    pub message: String,
}

impl From<ProviderError> for AuthError {
    fn from(error: ProviderError) -> Self {
        Self {
            code: error.code,
            message: error.message,
        }
    }
}

/// Explicit session over an injected identity provider.
///
/// The session holds no identity state of its own; the provider owns the
/// signed-in user. Cloning the session shares the same provider, so clones
/// observe the same auth state.
#[derive(Clone)]
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
}

impl Session {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Create a new identity with the backend and sign it in
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self.provider.create_account(email, password).await?;
        debug!("signed up {}", user.uid);
        Ok(user)
    }

    /// Authenticate an existing identity
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self.provider.authenticate(email, password).await?;
        debug!("signed in {}", user.uid);
        Ok(user)
    }

    /// Invalidate the local session. A no-op when no identity is resolved.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if self.provider.current_user().is_none() {
            return Ok(());
        }
        self.provider.sign_out().await?;
        debug!("signed out");
        Ok(())
    }

    /// Register a listener invoked on every sign-in/sign-out transition.
    /// Dropping the returned subscription stops further invocations.
    pub fn on_auth_changed(
        &self,
        listener: impl Fn(Option<AuthUser>) + Send + Sync + 'static,
    ) -> AuthSubscription {
        self.provider.subscribe(Box::new(listener))
    }

    /// Bearer token for the current identity, or `None` when unauthenticated.
    /// `force_refresh` reissues the token rather than using a cached one.
    pub async fn id_token(&self, force_refresh: bool) -> Result<Option<String>, AuthError> {
        Ok(self.provider.id_token(force_refresh).await?)
    }

    /// Currently signed-in user, resolved synchronously
    pub fn current_user(&self) -> Option<AuthUser> {
        self.provider.current_user()
    }

    /// Opaque identifier of the current identity, if one is resolved
    pub fn uid(&self) -> Option<String> {
        self.provider.current_user().map(|user| user.uid)
    }
}
