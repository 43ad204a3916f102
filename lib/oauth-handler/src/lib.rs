//! # OAuth Handler
//!
//! Attach OAuth2 *client credentials* bearer tokens to outgoing HTTP requests.
//!
//! - **[`OAuthHandler`]** wraps a request sender (a [`reqwest::Client`] by default) and sets
//!   `Authorization: Bearer <token>` on every request it forwards.
//! - **[`TokenStore`]** caches the current token and exchanges the client credentials at the
//!   token endpoint whenever the cached token is missing or expired.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use oauth_handler::{OAuthHandler, OAuthHandlerSettings, RequestSender};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = OAuthHandlerSettings::builder(
//!     "https://auth.example.com/connect/token",
//!     "my-client",
//!     "s3cret",
//! )?
//! .with_scope("read write")
//! .with_authentication_timeout(Duration::from_secs(5))
//! .build()?;
//!
//! let client = reqwest::Client::new();
//! let handler = OAuthHandler::with_sender(settings, client.clone());
//!
//! // The token is acquired on the first request, then reused until it expires
//! let request = client.get("https://api.example.com/users").build()?;
//! let body = handler.send(request).await?.text().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Token lifetime
//!
//! A token is reused while `expires_at >= now - token_expiry_threshold`, where `expires_at`
//! is the time the token response was parsed plus its `expires_in`. A token without
//! `expires_in` expires right away and is refreshed on the next request.
//!
//! ## Failures
//!
//! A failed token request never fails a request by itself:
//! - with a previous token, the handler keeps sending it ([`TokenLookup::Stale`]),
//! - without any token, [`OAuthHandler`] fails with [`OAuthError::NoUsableToken`] and the
//!   request is not sent.
//!
//! ## Concurrency
//!
//! Handlers and stores are cheap to clone and share their cache. The check-and-refresh
//! sequence is serialized, so concurrent requests wait for a single token request.
//! Token requests run on a spawned tokio task and complete even if the request that
//! triggered them is cancelled.

mod error;
pub use self::error::{OAuthError, SenderError};

mod handler;
pub use self::handler::OAuthHandler;

mod secret;
pub use self::secret::SecureString;

mod sender;
pub use self::sender::RequestSender;

mod settings;
pub use self::settings::{
    DEFAULT_AUTHENTICATION_TIMEOUT, DEFAULT_TOKEN_EXPIRY_THRESHOLD, OAuthHandlerSettings,
    OAuthHandlerSettingsBuilder,
};

mod store;
pub use self::store::{TokenLookup, TokenStore};

mod token;
pub use self::token::Token;

// Re-export the timestamp type used by `Token`
pub use jiff::Timestamp;
