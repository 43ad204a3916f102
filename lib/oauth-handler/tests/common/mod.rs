#![allow(dead_code)]

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use oauth_handler::{OAuthHandlerSettings, OAuthHandlerSettingsBuilder, Token};
use rstest::fixture;
use serde_json::json;
use tracing::info;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/connect/token";
pub const RESOURCE_PATH: &str = "/api/resource";

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

/// A mock server playing both the authorization server and the protected API.
#[fixture]
pub async fn server() -> MockServer {
    init_tracing();
    MockServer::start().await
}

pub fn settings_builder(server: &MockServer) -> OAuthHandlerSettingsBuilder {
    OAuthHandlerSettings::builder(
        format!("{}{TOKEN_PATH}", server.uri()),
        "my-client",
        "s3cret",
    )
    .expect("valid token endpoint")
    .with_authentication_timeout(Duration::from_secs(2))
}

pub fn settings(server: &MockServer) -> OAuthHandlerSettings {
    settings_builder(server).build().expect("valid settings")
}

/// Matches a client-credentials token request with the default credentials.
pub fn token_request() -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "grant_type=client_credentials&client_id=my-client&client_secret=s3cret",
        ))
}

pub fn token_granted(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "expires_in": expires_in,
    }))
}

/// Matches a call to the protected API carrying the given bearer token.
pub fn resource_request(access_token: &str) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .and(header("authorization", format!("Bearer {access_token}").as_str()))
}

pub fn resource_url(server: &MockServer) -> String {
    format!("{}{RESOURCE_PATH}", server.uri())
}

/// A token created `age_secs` seconds ago.
pub fn token_created_ago(access_token: &str, expires_in: i64, age_secs: i64) -> Token {
    let created_at = Timestamp::now()
        .checked_sub(SignedDuration::from_secs(age_secs))
        .expect("valid timestamp");
    Token::new(access_token)
        .with_token_type("Bearer")
        .with_expires_in(expires_in)
        .with_created_at(created_at)
}
