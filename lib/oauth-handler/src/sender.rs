//! Abstraction over whatever actually sends HTTP requests.

use std::future::Future;

use reqwest::{Request, Response};

/// A capability that sends an HTTP request and returns the response.
///
/// This is the seam [`OAuthHandler`](crate::OAuthHandler) wraps. It is implemented for
/// [`reqwest::Client`], and `OAuthHandler` implements it itself, so handlers can be stacked.
///
/// # Example
///
/// ```rust
/// use oauth_handler::RequestSender;
/// use reqwest::{Request, Response};
///
/// /// Answers every request with `204 No Content`.
/// #[derive(Debug)]
/// struct NoContent;
///
/// impl RequestSender for NoContent {
///     type Error = std::convert::Infallible;
///
///     async fn send(&self, _request: Request) -> Result<Response, Self::Error> {
///         let response = http::Response::builder()
///             .status(204)
///             .body(Vec::new())
///             .expect("valid response");
///         Ok(Response::from(response))
///     }
/// }
/// ```
pub trait RequestSender: Send + Sync {
    /// Error returned when the request cannot be delivered.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends the request.
    ///
    /// Dropping the returned future cancels the request.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send;
}

impl RequestSender for reqwest::Client {
    type Error = reqwest::Error;

    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        self.execute(request)
    }
}
