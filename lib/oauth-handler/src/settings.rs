//! Handler configuration and builder.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::OAuthError;
use crate::secret::SecureString;

/// Default timeout for a single token request.
pub const DEFAULT_AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default token expiry threshold.
pub const DEFAULT_TOKEN_EXPIRY_THRESHOLD: Duration = Duration::from_secs(20);

const CLIENT_CREDENTIALS: &str = "client_credentials";

/// Immutable settings consumed by [`TokenStore`](crate::TokenStore) and
/// [`OAuthHandler`](crate::OAuthHandler).
///
/// Create instances with [`OAuthHandlerSettings::builder`], or deserialize them from JSON.
/// Keys may be camelCase or PascalCase; durations are whole seconds or `hh:mm:ss` strings:
///
/// ```rust
/// use std::time::Duration;
/// use oauth_handler::OAuthHandlerSettings;
///
/// let settings: OAuthHandlerSettings = serde_json::from_str(r#"{
///     "tokenEndpoint": "https://auth.example.com/connect/token",
///     "clientId": "my-client",
///     "clientSecret": "s3cret",
///     "scopes": "read write",
///     "authenticationTimeout": 5
/// }"#)?;
///
/// assert_eq!(settings.scope(), Some("read write"));
/// assert_eq!(settings.authentication_timeout(), Duration::from_secs(5));
/// assert_eq!(settings.token_expiry_threshold(), Duration::from_secs(20));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Deserialize)]
#[serde(try_from = "RawSettings")]
pub struct OAuthHandlerSettings {
    token_endpoint: Url,
    client_id: String,
    client_secret: SecureString,
    scope: Option<String>,
    authentication_timeout: Duration,
    token_expiry_threshold: Duration,
}

impl OAuthHandlerSettings {
    /// Creates a builder with the required client credentials.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidTokenEndpoint`] if `token_endpoint` is not an absolute URL.
    pub fn builder(
        token_endpoint: impl AsRef<str>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecureString>,
    ) -> Result<OAuthHandlerSettingsBuilder, OAuthError> {
        OAuthHandlerSettingsBuilder::new(token_endpoint, client_id, client_secret)
    }

    /// The token endpoint URL.
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// The client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret.
    pub fn client_secret(&self) -> &SecureString {
        &self.client_secret
    }

    /// The configured scope, as given.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Timeout applied to each token request.
    pub fn authentication_timeout(&self) -> Duration {
        self.authentication_timeout
    }

    /// Grace period used when deciding whether the cached token is still usable.
    pub fn token_expiry_threshold(&self) -> Duration {
        self.token_expiry_threshold
    }

    /// Form fields of the client-credentials token request, in wire order.
    ///
    /// `scope` is only present when the configured scope is not blank.
    pub(crate) fn token_request_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("grant_type", CLIENT_CREDENTIALS),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = self.scope.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("scope", scope));
        }
        params
    }
}

impl fmt::Debug for OAuthHandlerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthHandlerSettings")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("authentication_timeout", &self.authentication_timeout)
            .field("token_expiry_threshold", &self.token_expiry_threshold)
            .finish()
    }
}

/// Builder for [`OAuthHandlerSettings`].
#[derive(Clone)]
pub struct OAuthHandlerSettingsBuilder {
    token_endpoint: Url,
    client_id: String,
    client_secret: SecureString,
    scope: Option<String>,
    authentication_timeout: Duration,
    token_expiry_threshold: Duration,
}

impl OAuthHandlerSettingsBuilder {
    fn new(
        token_endpoint: impl AsRef<str>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecureString>,
    ) -> Result<Self, OAuthError> {
        let token_endpoint = parse_token_endpoint(token_endpoint.as_ref())?;

        Ok(Self {
            token_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: None,
            authentication_timeout: DEFAULT_AUTHENTICATION_TIMEOUT,
            token_expiry_threshold: DEFAULT_TOKEN_EXPIRY_THRESHOLD,
        })
    }

    /// Sets the scope sent with token requests.
    ///
    /// A blank scope is kept but never sent.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the timeout applied to each token request.
    #[must_use]
    pub fn with_authentication_timeout(mut self, timeout: Duration) -> Self {
        self.authentication_timeout = timeout;
        self
    }

    /// Sets the token expiry threshold.
    #[must_use]
    pub fn with_token_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.token_expiry_threshold = threshold;
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] if the client id is blank or the
    /// authentication timeout is zero.
    pub fn build(self) -> Result<OAuthHandlerSettings, OAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::Configuration {
                reason: "client id must not be blank".to_string(),
            });
        }
        if self.authentication_timeout.is_zero() {
            return Err(OAuthError::Configuration {
                reason: "authentication timeout must be greater than zero".to_string(),
            });
        }

        Ok(OAuthHandlerSettings {
            token_endpoint: self.token_endpoint,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope,
            authentication_timeout: self.authentication_timeout,
            token_expiry_threshold: self.token_expiry_threshold,
        })
    }
}

impl fmt::Debug for OAuthHandlerSettingsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthHandlerSettingsBuilder")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

fn parse_token_endpoint(url: &str) -> Result<Url, OAuthError> {
    Url::parse(url).map_err(|err| OAuthError::InvalidTokenEndpoint {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

// Settings file shape. Keys are camelCase or PascalCase, durations are whole seconds
// or `[d.]hh:mm:ss[.fffffff]` strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(alias = "TokenEndpoint")]
    token_endpoint: String,
    #[serde(alias = "ClientId")]
    client_id: String,
    #[serde(alias = "ClientSecret")]
    client_secret: SecureString,
    #[serde(default, alias = "scope", alias = "Scopes")]
    scopes: Option<String>,
    #[serde(default, alias = "AuthenticationTimeout")]
    authentication_timeout: Option<RawDuration>,
    #[serde(default, alias = "TokenExpiryThreshold")]
    token_expiry_threshold: Option<RawDuration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    TimeSpan(String),
}

impl RawDuration {
    fn into_duration(self, field: &str) -> Result<Duration, OAuthError> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::TimeSpan(value) => {
                parse_time_span(&value).ok_or_else(|| OAuthError::Configuration {
                    reason: format!("invalid {field} '{value}', expected seconds or hh:mm:ss"),
                })
            }
        }
    }
}

fn parse_time_span(value: &str) -> Option<Duration> {
    let mut parts = value.trim().split(':');
    let (head, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (days.parse::<u64>().ok()?, hours),
        None => (0, head),
    };
    let hours = hours.parse::<u64>().ok()?;
    let minutes = minutes.parse::<u64>().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }

    let (seconds, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let seconds = seconds.parse::<u64>().ok()?;
    if seconds >= 60 || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse::<u32>().ok()?
    };

    let total = days
        .checked_mul(24)?
        .checked_add(hours)?
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?;
    Some(Duration::new(total, nanos))
}

impl TryFrom<RawSettings> for OAuthHandlerSettings {
    type Error = OAuthError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let RawSettings {
            token_endpoint,
            client_id,
            client_secret,
            scopes,
            authentication_timeout,
            token_expiry_threshold,
        } = raw;

        let mut builder = OAuthHandlerSettingsBuilder::new(token_endpoint, client_id, client_secret)?;
        if let Some(scope) = scopes {
            builder = builder.with_scope(scope);
        }
        if let Some(timeout) = authentication_timeout {
            builder = builder
                .with_authentication_timeout(timeout.into_duration("authentication timeout")?);
        }
        if let Some(threshold) = token_expiry_threshold {
            builder = builder
                .with_token_expiry_threshold(threshold.into_duration("token expiry threshold")?);
        }
        builder.build()
    }
}
