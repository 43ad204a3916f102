//! Error types.

/// Errors produced while acquiring tokens or sending authenticated requests.
///
/// Acquisition errors (`Transport`, `Rejected`, `InvalidTokenResponse`, `AcquisitionAborted`)
/// are reported by [`TokenStore`](crate::TokenStore) without aborting anything.
/// Only [`OAuthError::NoUsableToken`] stops [`OAuthHandler`](crate::OAuthHandler)
/// before the request goes out.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum OAuthError {
    /// The token request itself failed (connection refused, timeout, broken body...).
    #[display("Token request failed: {_0}")]
    Transport(reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[display("Token endpoint rejected the request with status {status}: {body}")]
    #[from(skip)]
    Rejected {
        /// HTTP status code returned by the token endpoint.
        status: u16,
        /// The `error` field of the payload, if any.
        error: Option<String>,
        /// The `error_description` field of the payload, if any.
        error_description: Option<String>,
        /// The raw response body.
        body: String,
    },

    /// The token endpoint answered with success but the body is not a token payload.
    #[display("Invalid token response: {reason}")]
    #[from(skip)]
    InvalidTokenResponse {
        /// Description of what was invalid.
        reason: String,
    },

    /// The background acquisition task did not run to completion.
    #[display("Token acquisition aborted: {reason}")]
    #[from(skip)]
    AcquisitionAborted {
        /// Description of the failure.
        reason: String,
    },

    /// No token was ever acquired, so no `Authorization` header can be built.
    #[display("No usable credential: {source}")]
    #[from(skip)]
    NoUsableToken {
        /// Why the last acquisition failed.
        source: Box<OAuthError>,
    },

    /// The access token contains characters that are invalid in an HTTP header.
    #[display("Bearer token contains invalid characters: {message}")]
    #[from(skip)]
    InvalidBearerToken {
        /// Description of the invalid characters or format issue.
        message: String,
    },

    /// The wrapped sender failed to deliver the request.
    #[display("Request failed: {_0}")]
    Send(SenderError),

    /// Token endpoint URL is invalid.
    #[display("Invalid token endpoint URL '{url}': {reason}")]
    #[from(skip)]
    InvalidTokenEndpoint {
        /// The invalid URL that was provided.
        url: String,
        /// Description of why the URL is invalid.
        reason: String,
    },

    /// Settings are inconsistent.
    #[display("OAuth configuration error: {reason}")]
    #[from(skip)]
    Configuration {
        /// Description of the configuration issue.
        reason: String,
    },
}

/// Error returned by the sender wrapped by an [`OAuthHandler`](crate::OAuthHandler).
#[derive(Debug, derive_more::Display)]
#[display("{_0}")]
pub struct SenderError(BoxError);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

impl SenderError {
    pub(crate) fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    /// Attempts to downcast the underlying sender error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Returns the underlying sender error.
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl std::error::Error for SenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl OAuthError {
    /// Returns `true` for the errors raised while talking to the token endpoint.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Rejected { .. }
                | Self::InvalidTokenResponse { .. }
                | Self::AcquisitionAborted { .. }
        )
    }
}
