use log::warn;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;

use crate::services::session::{AuthError, Session};

/// Callback invoked when an authenticated request comes back 401. In a
/// browser-style host this is where the application navigates to its
/// sign-in route; the client itself performs no navigation.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Errors from authenticated HTTP requests
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request was rejected as unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Token resolution failed: {0}")]
    Token(#[from] AuthError),
}

/// HTTP client wrapper that attaches the current identity's bearer token to
/// outgoing requests. The header is omitted when no identity is resolved.
pub struct AuthedClient {
    session: Session,
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl AuthedClient {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            on_unauthorized: None,
        }
    }

    /// Install a handler invoked exactly once per 401 response
    pub fn with_unauthorized_handler(
        mut self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    /// Send the request with an `Authorization: Bearer <token>` header when
    /// a token is resolvable. A 401 response invokes the unauthorized
    /// handler and fails with [`FetchError::Unauthorized`].
    pub async fn fetch(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let request = match self.session.id_token(false).await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("authenticated request rejected with 401");
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
            return Err(FetchError::Unauthorized);
        }

        Ok(response)
    }
}
