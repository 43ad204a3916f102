//! The authenticating request interceptor.

use std::future::Future;

use http::HeaderValue;
use reqwest::header::AUTHORIZATION;
use reqwest::{Request, Response};
use tracing::{debug, warn};

use crate::error::{OAuthError, SenderError};
use crate::sender::RequestSender;
use crate::settings::OAuthHandlerSettings;
use crate::store::{TokenLookup, TokenStore};
use crate::token::Token;

/// Request interceptor attaching `Authorization: Bearer <token>` to every request.
///
/// Before forwarding a request to the wrapped sender, the handler asks its [`TokenStore`]
/// for a usable token, then overwrites the `Authorization` header. The response, or the
/// sender error, is returned untouched.
///
/// Clones share the token cache.
///
/// # Example
///
/// ```rust,no_run
/// use oauth_handler::{OAuthHandler, OAuthHandlerSettings, RequestSender};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = OAuthHandlerSettings::builder(
///     "https://auth.example.com/connect/token",
///     "my-client",
///     "s3cret",
/// )?
/// .with_scope("read write")
/// .build()?;
///
/// let client = reqwest::Client::new();
/// let handler = OAuthHandler::with_sender(settings, client.clone());
///
/// let request = client.get("https://api.example.com/users").build()?;
/// let response = handler.send(request).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OAuthHandler<S = reqwest::Client> {
    store: TokenStore,
    inner: S,
}

impl OAuthHandler {
    /// Creates a handler wrapping a default [`reqwest::Client`].
    pub fn new(settings: OAuthHandlerSettings) -> Self {
        Self::with_sender(settings, reqwest::Client::new())
    }
}

impl<S> OAuthHandler<S>
where
    S: RequestSender,
{
    /// Creates a handler wrapping `inner`.
    pub fn with_sender(settings: OAuthHandlerSettings, inner: S) -> Self {
        Self::with_store(TokenStore::new(settings), inner)
    }

    /// Creates a handler sharing an existing store.
    pub fn with_store(store: TokenStore, inner: S) -> Self {
        Self { store, inner }
    }

    /// The settings used for token requests.
    pub fn settings(&self) -> &OAuthHandlerSettings {
        self.store.settings()
    }

    /// The token store.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The wrapped sender.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn authorize_and_send(&self, mut request: Request) -> Result<Response, OAuthError> {
        let token = match self.store.ensure_valid_token().await {
            TokenLookup::Stale { token, error } => {
                warn!(%error, expires_at = %token.expires_at(), "sending request with stale token");
                token
            }
            lookup => lookup.into_result()?,
        };

        let value = bearer_header(&token)?;
        request.headers_mut().insert(AUTHORIZATION, value);

        debug!(method = %request.method(), url = %request.url(), "sending authenticated request");
        self.inner
            .send(request)
            .await
            .map_err(|err| OAuthError::Send(SenderError::new(err)))
    }
}

impl<S> RequestSender for OAuthHandler<S>
where
    S: RequestSender,
{
    type Error = OAuthError;

    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        self.authorize_and_send(request)
    }
}

fn bearer_header(token: &Token) -> Result<HeaderValue, OAuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.access_token())).map_err(
        |err| OAuthError::InvalidBearerToken {
            message: err.to_string(),
        },
    )?;
    value.set_sensitive(true);
    Ok(value)
}
