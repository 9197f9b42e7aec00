use super::test_helpers::{MockAuthApi, user};
use super::*;
use crate::services::api::Role;
use crate::services::tokens::CookieTokenStore;
use axum_extra::extract::cookie::CookieJar;

fn client(api: &Arc<MockAuthApi>) -> AuthClient {
    AuthClient::new(api.clone())
}

#[tokio::test]
async fn request_otp_sends_e164_number() {
    let api = Arc::new(MockAuthApi::default());
    client(&api).request_otp("90 123 45 67").await.unwrap();
    assert_eq!(api.state().otp_phones, vec!["+998901234567".to_owned()]);
}

#[tokio::test]
async fn request_otp_rejects_short_number() {
    let api = Arc::new(MockAuthApi::default());
    let err = client(&api).request_otp("90 123").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidPhone));
    assert!(api.state().otp_phones.is_empty());
}

#[tokio::test]
async fn login_returns_user_and_tokens() {
    let api = Arc::new(MockAuthApi::with_user(user(1, Role::Student)));
    let resp = client(&api).login("901234567", "123456").await.unwrap();
    assert_eq!(resp.user.id, 1);
    assert_eq!(resp.tokens.access_token, "acc-1");
}

#[tokio::test]
async fn login_rejects_malformed_code_without_calling_api() {
    let api = Arc::new(MockAuthApi::with_user(user(1, Role::Student)));
    for code in ["12345", "1234567", "12a456", ""] {
        let err = client(&api).login("901234567", code).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode), "code {code:?}");
    }
}

#[tokio::test]
async fn login_network_failure_propagates() {
    let api = Arc::new(MockAuthApi::default());
    let err = client(&api).login("901234567", "123456").await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Request(_))));
}

#[tokio::test]
async fn refresh_tokens_writes_new_pair() {
    let api = Arc::new(MockAuthApi::with_user(user(1, Role::Student)));
    let mut store = CookieTokenStore::new(CookieJar::new(), false);
    store.set_tokens("acc-1", "ref-1");

    let pair = client(&api).refresh_tokens(&mut store).await.unwrap();
    assert_eq!(pair.access_token, "acc-2");
    assert_eq!(store.access_token().as_deref(), Some("acc-2"));
    assert_eq!(store.refresh_token().as_deref(), Some("ref-2"));
}

#[tokio::test]
async fn refresh_tokens_without_refresh_cookie_fails() {
    let api = Arc::new(MockAuthApi::with_user(user(1, Role::Student)));
    let mut store = CookieTokenStore::new(CookieJar::new(), false);
    let err = client(&api).refresh_tokens(&mut store).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingRefreshToken));
    assert_eq!(api.state().refresh_calls, 0);
}

#[tokio::test]
async fn refresh_tokens_failure_leaves_store_untouched() {
    let api = Arc::new(MockAuthApi::with_user(user(1, Role::Student)));
    let mut store = CookieTokenStore::new(CookieJar::new(), false);
    store.set_tokens("acc-1", "stale");

    assert!(client(&api).refresh_tokens(&mut store).await.is_err());
    assert_eq!(store.access_token().as_deref(), Some("acc-1"));
    assert_eq!(store.refresh_token().as_deref(), Some("stale"));
}
