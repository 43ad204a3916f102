#![allow(missing_docs)]

use std::time::Duration;

use oauth_handler::{OAuthError, TokenLookup, TokenStore};
use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
pub use self::common::*;

#[rstest]
#[tokio::test]
async fn test_cached_token_is_reused(#[future] server: MockServer) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("fresh", 3600))
        .expect(0)
        .mount(&server)
        .await;

    let token = token_created_ago("cached", 3600, 60);
    let store = TokenStore::with_token(settings(&server), token.clone());

    let lookup = store.ensure_valid_token().await;

    let cached = match lookup {
        TokenLookup::Cached(cached) => cached,
        other => anyhow::bail!("Expected a cache hit, got {other:?}"),
    };
    assert_eq!(cached, token);
    assert_eq!(store.current_token().await, Some(token));

    Ok(())
}

#[rstest]
#[case::beyond_threshold(3621, Duration::from_secs(20))]
#[case::no_threshold(3601, Duration::ZERO)]
#[tokio::test]
async fn test_expired_token_triggers_one_request(
    #[future] server: MockServer,
    #[case] age_secs: i64,
    #[case] threshold: Duration,
) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("fresh", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings_builder(&server)
        .with_token_expiry_threshold(threshold)
        .build()?;
    let store = TokenStore::with_token(settings, token_created_ago("old", 3600, age_secs));

    let lookup = store.ensure_valid_token().await;

    let token = match lookup {
        TokenLookup::Acquired(token) => token,
        other => anyhow::bail!("Expected a new token, got {other:?}"),
    };
    assert_eq!(token.access_token(), "fresh");
    assert_eq!(token.token_type(), Some("Bearer"));
    assert_eq!(token.expires_in(), Some(3600));

    // the new token is now cached
    let lookup = store.ensure_valid_token().await;
    assert!(matches!(lookup, TokenLookup::Cached(_)), "{lookup:?}");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_token_within_threshold_after_expiry_is_reused(
    #[future] server: MockServer,
) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("fresh", 3600))
        .expect(0)
        .mount(&server)
        .await;

    // one second past `expires_in`, inside the default 20s threshold
    let store = TokenStore::with_token(settings(&server), token_created_ago("old", 3600, 3601));

    let lookup = store.ensure_valid_token().await;

    let token = match lookup {
        TokenLookup::Cached(token) => token,
        other => anyhow::bail!("Expected a cache hit, got {other:?}"),
    };
    assert_eq!(token.access_token(), "old");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_scope_is_sent_when_configured(#[future] server: MockServer) -> anyhow::Result<()> {
    let server = server.await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string(
            "grant_type=client_credentials&client_id=my-client&client_secret=s3cret&scope=read+write",
        ))
        .respond_with(token_granted("scoped", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings_builder(&server).with_scope("read write").build()?;
    let store = TokenStore::new(settings);

    let token = store.ensure_valid_token().await.into_result()?;
    assert_eq!(token.access_token(), "scoped");

    Ok(())
}

#[rstest]
#[case::empty("")]
#[case::whitespace("   ")]
#[tokio::test]
async fn test_blank_scope_is_omitted(
    #[future] server: MockServer,
    #[case] scope: &str,
) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("unscoped", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings_builder(&server).with_scope(scope).build()?;
    let store = TokenStore::new(settings);

    let token = store.ensure_valid_token().await.into_result()?;
    assert_eq!(token.access_token(), "unscoped");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_rejection_keeps_current_token(#[future] server: MockServer) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let previous = token_created_ago("old", 3600, 7200);
    let store = TokenStore::with_token(settings(&server), previous.clone());

    let lookup = store.ensure_valid_token().await;

    let (token, error) = match lookup {
        TokenLookup::Stale { token, error } => (token, error),
        other => anyhow::bail!("Expected a stale token, got {other:?}"),
    };
    assert_eq!(token, previous);
    match error {
        OAuthError::Rejected {
            status,
            error,
            error_description,
            ..
        } => {
            assert_eq!(status, 401);
            assert_eq!(error.as_deref(), Some("invalid_client"));
            assert_eq!(
                error_description.as_deref(),
                Some("Client authentication failed")
            );
        }
        other => anyhow::bail!("Expected Rejected, got {other:?}"),
    }
    assert_eq!(store.current_token().await, Some(previous));

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_invalid_success_body_keeps_store_empty(
    #[future] server: MockServer,
) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let store = TokenStore::new(settings(&server));

    let lookup = store.ensure_valid_token().await;

    let error = match lookup {
        TokenLookup::Unavailable { error } => error,
        other => anyhow::bail!("Expected no token, got {other:?}"),
    };
    assert!(matches!(error, OAuthError::InvalidTokenResponse { .. }), "{error:?}");
    assert_eq!(store.current_token().await, None);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_token_without_lifetime_is_refreshed_on_next_call(
    #[future] server: MockServer,
) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "abc" })))
        .expect(2)
        .mount(&server)
        .await;

    let settings = settings_builder(&server)
        .with_token_expiry_threshold(Duration::ZERO)
        .build()?;
    let store = TokenStore::new(settings);

    let first = store.ensure_valid_token().await;
    assert!(matches!(first, TokenLookup::Acquired(_)), "{first:?}");

    // `expires_at` is the creation time: no longer usable once the clock moves on
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = store.ensure_valid_token().await;
    assert!(matches!(second, TokenLookup::Acquired(_)), "{second:?}");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_token_request_times_out(#[future] server: MockServer) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("late", 3600).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let settings = settings_builder(&server)
        .with_authentication_timeout(Duration::from_millis(100))
        .build()?;
    let store = TokenStore::new(settings);

    let result = store.acquire_token().await;

    match result {
        Err(OAuthError::Transport(err)) => assert!(err.is_timeout(), "{err:?}"),
        other => anyhow::bail!("Expected a timeout, got {other:?}"),
    }
    assert_eq!(store.current_token().await, None);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_acquire_token_bypasses_cache(#[future] server: MockServer) -> anyhow::Result<()> {
    let server = server.await;
    token_request()
        .respond_with(token_granted("direct", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let cached = token_created_ago("cached", 3600, 0);
    let store = TokenStore::with_token(settings(&server), cached.clone());

    let token = store.acquire_token().await?;

    assert_eq!(token.access_token(), "direct");
    assert_eq!(store.current_token().await, Some(cached));

    Ok(())
}
