//! Token endpoint payloads and the cached token.

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::Deserialize;

use crate::error::OAuthError;
use crate::secret::SecureString;

/// Body of a token endpoint response, success or failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenPayload {
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    access_token: Option<SecureString>,
    #[serde(default)]
    issues_token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenPayload {
    /// Best effort parsing, used for error bodies that may not be JSON at all.
    pub(crate) fn parse_lenient(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub(crate) fn into_error_fields(self) -> (Option<String>, Option<String>) {
        (self.error, self.error_description)
    }
}

/// An access token obtained from the token endpoint.
///
/// Tokens are immutable: a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    access_token: SecureString,
    token_type: Option<String>,
    issues_token_type: Option<String>,
    expires_in: Option<i64>,
    created_at: Timestamp,
    error: Option<String>,
    error_description: Option<String>,
}

impl Token {
    /// Creates a token created now, with an unknown lifetime.
    pub fn new(access_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            issues_token_type: None,
            expires_in: None,
            created_at: Timestamp::now(),
            error: None,
            error_description: None,
        }
    }

    /// Sets the advertised lifetime, in seconds.
    #[must_use]
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sets the token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Parses a successful token endpoint body.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidTokenResponse`] when the body is not JSON or has no
    /// `access_token`.
    pub fn from_response_body(body: &str, created_at: Timestamp) -> Result<Self, OAuthError> {
        let payload = serde_json::from_str::<TokenPayload>(body).map_err(|err| {
            OAuthError::InvalidTokenResponse {
                reason: err.to_string(),
            }
        })?;

        let TokenPayload {
            token_type,
            access_token,
            issues_token_type,
            expires_in,
            error,
            error_description,
        } = payload;

        let Some(access_token) = access_token else {
            let reason = match (&error, &error_description) {
                (Some(error), Some(description)) => {
                    format!("missing access_token ({error}: {description})")
                }
                (Some(error), None) => format!("missing access_token ({error})"),
                _ => "missing access_token".to_string(),
            };
            return Err(OAuthError::InvalidTokenResponse { reason });
        };

        Ok(Self {
            access_token,
            token_type,
            issues_token_type,
            expires_in,
            created_at,
            error,
            error_description,
        })
    }

    /// Returns the access token value.
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// The `token_type` announced by the server (usually `Bearer`).
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// The `issues_token_type` announced by the server.
    pub fn issues_token_type(&self) -> Option<&str> {
        self.issues_token_type.as_deref()
    }

    /// Advertised lifetime in seconds, if any.
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    /// When the token response was parsed.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// `error` field carried by the payload, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `error_description` field carried by the payload, if any.
    pub fn error_description(&self) -> Option<&str> {
        self.error_description.as_deref()
    }

    /// Creation time plus the advertised lifetime.
    ///
    /// A token without `expires_in` expires at its creation time.
    pub fn expires_at(&self) -> Timestamp {
        let lifetime = SignedDuration::from_secs(self.expires_in.unwrap_or(0));
        self.created_at.checked_add(lifetime).unwrap_or(if lifetime.is_negative() {
            Timestamp::MIN
        } else {
            Timestamp::MAX
        })
    }

    /// Checks whether the token may still be used at `now`.
    ///
    /// The threshold is subtracted from `now`, not from the expiry: the token stays usable
    /// until `threshold` after its nominal expiry.
    pub fn is_usable_at(&self, now: Timestamp, threshold: Duration) -> bool {
        let floor = SignedDuration::try_from(threshold)
            .ok()
            .and_then(|threshold| now.checked_sub(threshold).ok())
            .unwrap_or(Timestamp::MIN);

        self.expires_at() >= floor
    }
}
