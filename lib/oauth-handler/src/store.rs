//! Token cache and token endpoint exchange.

use std::sync::Arc;

use jiff::Timestamp;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::OAuthError;
use crate::settings::OAuthHandlerSettings;
use crate::token::{Token, TokenPayload};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Outcome of [`TokenStore::ensure_valid_token`].
#[derive(Debug)]
pub enum TokenLookup {
    /// The cached token is still usable; no request was made.
    Cached(Token),
    /// A new token was acquired and is now the current one.
    Acquired(Token),
    /// Acquisition failed; the previous token is kept as is.
    Stale {
        /// The previous, possibly expired, token.
        token: Token,
        /// Why the acquisition failed.
        error: OAuthError,
    },
    /// Acquisition failed and no token was ever acquired.
    Unavailable {
        /// Why the acquisition failed.
        error: OAuthError,
    },
}

impl TokenLookup {
    /// The token to use, if any.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Cached(token) | Self::Acquired(token) | Self::Stale { token, .. } => Some(token),
            Self::Unavailable { .. } => None,
        }
    }

    /// The acquisition error, if the lookup attempted one and failed.
    pub fn error(&self) -> Option<&OAuthError> {
        match self {
            Self::Stale { error, .. } | Self::Unavailable { error } => Some(error),
            Self::Cached(_) | Self::Acquired(_) => None,
        }
    }

    /// Returns the token to use, stale or not.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::NoUsableToken`] when no token is available at all.
    pub fn into_result(self) -> Result<Token, OAuthError> {
        match self {
            Self::Cached(token) | Self::Acquired(token) | Self::Stale { token, .. } => Ok(token),
            Self::Unavailable { error } => Err(OAuthError::NoUsableToken {
                source: Box::new(error),
            }),
        }
    }
}

/// Holds the current token and acquires a new one when needed.
///
/// Clones share the same cache. The check-and-refresh sequence runs under a single lock,
/// so concurrent callers wait for an in-flight acquisition instead of starting their own.
///
/// # Example
///
/// ```rust,no_run
/// use oauth_handler::{OAuthHandlerSettings, TokenStore};
///
/// # async fn example() -> Result<(), oauth_handler::OAuthError> {
/// let settings = OAuthHandlerSettings::builder(
///     "https://auth.example.com/connect/token",
///     "my-client",
///     "s3cret",
/// )?
/// .build()?;
///
/// let store = TokenStore::new(settings);
/// let token = store.ensure_valid_token().await.into_result()?;
/// println!("expires at {}", token.expires_at());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenStore {
    settings: Arc<OAuthHandlerSettings>,
    current: Arc<Mutex<Option<Token>>>,
}

impl TokenStore {
    /// Creates an empty store.
    pub fn new(settings: OAuthHandlerSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            current: Arc::default(),
        }
    }

    /// Creates a store seeded with an existing token.
    pub fn with_token(settings: OAuthHandlerSettings, token: Token) -> Self {
        Self {
            settings: Arc::new(settings),
            current: Arc::new(Mutex::new(Some(token))),
        }
    }

    /// The settings used for token requests.
    pub fn settings(&self) -> &OAuthHandlerSettings {
        &self.settings
    }

    /// Returns the current token without checking its expiry.
    ///
    /// Waits for an in-flight acquisition to finish.
    pub async fn current_token(&self) -> Option<Token> {
        self.current.lock().await.clone()
    }

    /// Makes sure a usable token is held, acquiring one if the cached token is missing or
    /// expired.
    ///
    /// The cached token is reused while `expires_at >= now - token_expiry_threshold`.
    /// Failures never clear the cache: they are reported through [`TokenLookup::Stale`] or
    /// [`TokenLookup::Unavailable`].
    ///
    /// The token request runs on a spawned task holding the store lock: dropping this future
    /// does not abort it, and the next caller gets its result.
    pub async fn ensure_valid_token(&self) -> TokenLookup {
        let current = Arc::clone(&self.current).lock_owned().await;

        let threshold = self.settings.token_expiry_threshold();
        if let Some(token) = current
            .as_ref()
            .filter(|token| token.is_usable_at(Timestamp::now(), threshold))
        {
            debug!(expires_at = %token.expires_at(), "reusing cached token");
            return TokenLookup::Cached(token.clone());
        }

        let settings = Arc::clone(&self.settings);
        let refresh = tokio::spawn(async move {
            let result = request_token(&settings).await;
            store_result(current, result)
        });

        match refresh.await {
            Ok(lookup) => lookup,
            Err(err) => {
                let error = OAuthError::AcquisitionAborted {
                    reason: err.to_string(),
                };
                warn!(%error, "token acquisition task failed");
                match self.current_token().await {
                    Some(token) => TokenLookup::Stale { token, error },
                    None => TokenLookup::Unavailable { error },
                }
            }
        }
    }

    /// Performs a token request, leaving the cache untouched.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error: [`OAuthError::Transport`], [`OAuthError::Rejected`]
    /// or [`OAuthError::InvalidTokenResponse`].
    pub async fn acquire_token(&self) -> Result<Token, OAuthError> {
        request_token(&self.settings).await
    }
}

fn store_result(
    mut current: OwnedMutexGuard<Option<Token>>,
    result: Result<Token, OAuthError>,
) -> TokenLookup {
    match result {
        Ok(token) => {
            *current = Some(token.clone());
            TokenLookup::Acquired(token)
        }
        Err(error) => {
            warn!(%error, has_previous = current.is_some(), "token not acquired");
            match current.as_ref() {
                Some(token) => TokenLookup::Stale {
                    token: token.clone(),
                    error,
                },
                None => TokenLookup::Unavailable { error },
            }
        }
    }
}

pub(crate) fn encode_token_request(settings: &OAuthHandlerSettings) -> Result<String, OAuthError> {
    serde_urlencoded::to_string(settings.token_request_params()).map_err(|err| {
        OAuthError::Configuration {
            reason: format!("cannot encode token request: {err}"),
        }
    })
}

async fn request_token(settings: &OAuthHandlerSettings) -> Result<Token, OAuthError> {
    // Token requests are rare, a short-lived client without idle pool is enough.
    let client = reqwest::Client::builder()
        .timeout(settings.authentication_timeout())
        .pool_max_idle_per_host(0)
        .build()?;

    let body = encode_token_request(settings)?;

    debug!(
        token_endpoint = %settings.token_endpoint(),
        client_id = settings.client_id(),
        "requesting access token"
    );
    let response = client
        .post(settings.token_endpoint().clone())
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    debug!(%status, "token endpoint responded");

    if !status.is_success() {
        let (error, error_description) = TokenPayload::parse_lenient(&body).into_error_fields();
        warn!(%status, ?error, ?error_description, "token request rejected");
        return Err(OAuthError::Rejected {
            status: status.as_u16(),
            error,
            error_description,
            body,
        });
    }

    Token::from_response_body(&body, Timestamp::now())
}
