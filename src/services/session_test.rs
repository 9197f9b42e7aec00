use super::*;
use crate::services::api::Role;
use crate::services::auth::test_helpers::{MockAuthApi, user};
use crate::services::tokens::{ACCESS_TOKEN_COOKIE, CookieTokenStore, REFRESH_TOKEN_COOKIE};
use axum_extra::extract::cookie::{Cookie, CookieJar};

fn jar_with(access: &'static str, refresh: &'static str) -> CookieJar {
    CookieJar::new()
        .add(Cookie::new(ACCESS_TOKEN_COOKIE, access))
        .add(Cookie::new(REFRESH_TOKEN_COOKIE, refresh))
}

fn authority_with(
    api: &Arc<MockAuthApi>,
    storage: Arc<dyn SessionStorage>,
    jar: CookieJar,
) -> SessionAuthority<CookieTokenStore> {
    SessionAuthority::new(AuthClient::new(api.clone()), storage, CookieTokenStore::new(jar, false))
}

fn authority(api: &Arc<MockAuthApi>, jar: CookieJar) -> SessionAuthority<CookieTokenStore> {
    authority_with(api, Arc::new(MemoryStorage::default()), jar)
}

fn student_api() -> Arc<MockAuthApi> {
    Arc::new(MockAuthApi::with_user(user(1, Role::Student)))
}

// =============================================================================
// Session / SessionStore
// =============================================================================

#[test]
fn new_session_is_loading() {
    let session = Session::default();
    assert!(!session.has_hydrated());
    assert!(!session.is_authenticated());
    assert_eq!(session.status(), SessionStatus::Loading);
    assert_eq!(session.status().as_str(), "loading");
}

#[test]
fn authenticate_sets_user_and_token_together() {
    let mut store = SessionStore::new(Arc::new(DetachedStorage));
    store.authenticate(user(1, Role::Admin), "acc".into(), None);
    store.mark_hydrated();
    let session = store.session();
    assert!(session.is_authenticated());
    assert!(session.user().is_some());
    assert_eq!(session.access_token(), Some("acc"));
    assert_eq!(session.status(), SessionStatus::Authenticated);
}

#[test]
fn clear_keeps_hydration_flag() {
    let mut store = SessionStore::new(Arc::new(DetachedStorage));
    store.mark_hydrated();
    store.authenticate(user(1, Role::Admin), "acc".into(), Some("ref".into()));
    store.clear();
    let session = store.session();
    assert!(session.has_hydrated());
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(session.access_token().is_none());
    assert!(session.refresh_token().is_none());
}

#[test]
fn store_persists_blob_and_clear_removes_it() {
    let storage = Arc::new(MemoryStorage::default());
    let mut store = SessionStore::new(storage.clone());
    store.authenticate(user(3, Role::Teacher), "acc".into(), Some("ref".into()));

    let persisted = store.read_persisted().unwrap();
    assert!(persisted.is_authenticated);
    assert_eq!(persisted.user.unwrap().id, 3);
    assert_eq!(persisted.access_token.as_deref(), Some("acc"));

    let raw = storage.load(SESSION_STORAGE_KEY).unwrap();
    assert!(raw.contains("\"isAuthenticated\":true"));

    store.clear();
    assert!(storage.load(SESSION_STORAGE_KEY).is_none());
}

#[test]
fn malformed_blob_reads_as_none() {
    let storage = Arc::new(MemoryStorage::default());
    storage.save(SESSION_STORAGE_KEY, "{not json");
    let store = SessionStore::new(storage);
    assert!(store.read_persisted().is_none());
}

#[test]
fn detached_storage_drops_writes() {
    let storage = DetachedStorage;
    storage.save("k", "v");
    assert!(storage.load("k").is_none());
}

// =============================================================================
// hydrate
// =============================================================================

#[tokio::test]
async fn hydrate_with_valid_cookie_authenticates() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    assert_eq!(auth.status(), SessionStatus::Loading);

    assert_eq!(auth.hydrate().await, SessionStatus::Authenticated);
    let session = auth.session();
    assert!(session.has_hydrated());
    assert_eq!(session.user().unwrap().id, 1);
    assert_eq!(session.access_token(), Some("acc-1"));
}

#[tokio::test]
async fn hydrate_without_cookie_is_unauthenticated_without_remote_call() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new());
    assert_eq!(auth.hydrate().await, SessionStatus::Unauthenticated);
    assert!(auth.session().has_hydrated());
    assert_eq!(api.state().me_calls, 0);
}

#[tokio::test]
async fn hydrate_rejected_token_clears_cookies() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, "forged")));
    assert_eq!(auth.hydrate().await, SessionStatus::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn hydrate_rotates_expired_access_token() {
    let api = student_api();
    let auth = authority(&api, jar_with("expired", "ref-1"));
    assert_eq!(auth.hydrate().await, SessionStatus::Authenticated);
    assert_eq!(api.state().refresh_calls, 1);
    assert_eq!(auth.access_token().as_deref(), Some("acc-2"));
    assert_eq!(auth.session().refresh_token(), Some("ref-2"));

    let tokens = auth.into_tokens();
    assert_eq!(tokens.refresh_token().as_deref(), Some("ref-2"));
}

#[tokio::test]
async fn hydrate_rejected_refresh_is_unauthenticated() {
    let api = student_api();
    let auth = authority(&api, jar_with("expired", "also-expired"));
    assert_eq!(auth.hydrate().await, SessionStatus::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn hydrate_transport_failure_degrades_but_keeps_cookies() {
    let api = student_api();
    api.state().fail_me_transport = true;
    let auth = authority(&api, jar_with("acc-1", "ref-1"));

    assert_eq!(auth.hydrate().await, SessionStatus::Unauthenticated);
    assert!(auth.session().has_hydrated());
    assert_eq!(auth.access_token().as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn hydrate_runs_once() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;
    auth.hydrate().await;
    assert_eq!(api.state().me_calls, 1);
}

#[tokio::test]
async fn rehydrates_from_shared_storage() {
    let api = student_api();
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::default());

    let first = authority_with(&api, storage.clone(), CookieJar::new());
    first.login("901234567", "123456").await.unwrap();
    let jar = first.into_tokens().into_jar();
    assert!(storage.load(SESSION_STORAGE_KEY).is_some());

    let second = authority_with(&api, storage.clone(), jar);
    assert_eq!(second.status(), SessionStatus::Loading);
    assert_eq!(second.hydrate().await, SessionStatus::Authenticated);
}

#[tokio::test]
async fn persisted_blob_without_cookie_does_not_authenticate() {
    let api = student_api();
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::default());

    let first = authority_with(&api, storage.clone(), CookieJar::new());
    first.login("901234567", "123456").await.unwrap();

    let second = authority_with(&api, storage.clone(), CookieJar::new());
    assert_eq!(second.hydrate().await, SessionStatus::Unauthenticated);
    assert!(storage.load(SESSION_STORAGE_KEY).is_none());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_sets_cookies_and_session() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new());

    let u = auth.login("90 123 45 67", "123456").await.unwrap();
    assert_eq!(u.role, Role::Student);
    assert_eq!(auth.status(), SessionStatus::Authenticated);
    assert_eq!(auth.access_token().as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn login_failure_propagates_and_leaves_state() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new());
    auth.hydrate().await;

    let err = auth.login("901234567", "000000").await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Status { status: 400, .. })));
    assert_eq!(auth.status(), SessionStatus::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn login_network_failure_propagates() {
    let api = Arc::new(MockAuthApi::default());
    let auth = authority(&api, CookieJar::new());
    let err = auth.login("901234567", "123456").await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Request(_))));
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_clears_everything() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    assert_eq!(auth.logout().await, "/login");
    let session = auth.session();
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(session.has_hydrated());
    assert_eq!(api.state().logout_calls, 1);

    let tokens = auth.into_tokens();
    assert!(tokens.access_token().is_none());
    assert!(tokens.refresh_token().is_none());
}

#[tokio::test]
async fn logout_succeeds_locally_when_remote_fails() {
    let api = student_api();
    api.state().fail_logout = true;
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    auth.logout().await;
    assert_eq!(auth.status(), SessionStatus::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn logout_is_bounded_when_remote_hangs() {
    let api = student_api();
    api.state().hang_logout = true;
    let auth = authority(&api, jar_with("acc-1", "ref-1")).with_logout_timeout(Duration::from_millis(20));
    auth.hydrate().await;

    let redirect = tokio::time::timeout(Duration::from_secs(2), auth.logout())
        .await
        .expect("logout must not block on the network");
    assert_eq!(redirect, "/login");
    assert!(!auth.session().is_authenticated());
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn second_logout_is_a_local_noop() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    auth.logout().await;
    auth.logout().await;
    assert_eq!(api.state().logout_calls, 1);
    assert_eq!(auth.status(), SessionStatus::Unauthenticated);
}

// =============================================================================
// refresh / refresh_tokens
// =============================================================================

#[tokio::test]
async fn refresh_updates_user() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    api.state().user.as_mut().unwrap().first_name = "Vali".into();
    let u = auth.refresh().await.unwrap();
    assert_eq!(u.first_name, "Vali");
    assert_eq!(auth.user().unwrap().first_name, "Vali");
    assert_eq!(auth.access_token().as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn refresh_without_token_is_not_authenticated() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new());
    assert!(matches!(auth.refresh().await, Err(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn refresh_failure_keeps_session() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    api.state().fail_me_transport = true;
    assert!(auth.refresh().await.is_err());
    assert_eq!(auth.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn refresh_with_changed_role_forces_relogin() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    api.state().user.as_mut().unwrap().role = Role::Teacher;
    assert!(matches!(auth.refresh().await, Err(AuthError::RoleChanged)));
    assert_eq!(auth.status(), SessionStatus::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn refresh_tokens_updates_store_and_cache() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;

    auth.refresh_tokens().await.unwrap();
    assert_eq!(auth.access_token().as_deref(), Some("acc-2"));
    let session = auth.session();
    assert_eq!(session.access_token(), Some("acc-2"));
    assert_eq!(session.refresh_token(), Some("ref-2"));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn refresh_tokens_without_refresh_cookie_fails() {
    let api = student_api();
    let auth = authority(&api, CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, "acc-1")));
    assert!(matches!(auth.refresh_tokens().await, Err(AuthError::MissingRefreshToken)));
}

// =============================================================================
// overlapping transitions
// =============================================================================

fn gated(api: &Arc<MockAuthApi>) -> Arc<tokio::sync::Notify> {
    let gate = Arc::new(tokio::sync::Notify::new());
    api.state().me_gate = Some(gate.clone());
    gate
}

async fn wait_for_me_call(api: &MockAuthApi) {
    while api.state().me_calls == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn logout_during_hydration_stays_logged_out() {
    let api = student_api();
    let gate = gated(&api);
    let auth = Arc::new(authority(&api, jar_with("acc-1", "ref-1")));

    let hydrating = tokio::spawn({
        let auth = auth.clone();
        async move { auth.hydrate().await }
    });
    wait_for_me_call(&api).await;

    auth.logout().await;
    gate.notify_one();

    assert_eq!(hydrating.await.unwrap(), SessionStatus::Unauthenticated);
    let session = auth.session();
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn login_during_rejected_hydration_is_kept() {
    let api = student_api();
    let gate = gated(&api);
    let auth = Arc::new(authority(&api, CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, "forged"))));

    let hydrating = tokio::spawn({
        let auth = auth.clone();
        async move { auth.hydrate().await }
    });
    wait_for_me_call(&api).await;

    auth.login("901234567", "123456").await.unwrap();
    gate.notify_one();

    assert_eq!(hydrating.await.unwrap(), SessionStatus::Authenticated);
    assert_eq!(auth.status(), SessionStatus::Authenticated);
    assert_eq!(auth.access_token().as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn concurrent_hydrations_settle_on_one_result() {
    let api = student_api();
    let auth = Arc::new(authority(&api, jar_with("acc-1", "ref-1")));

    let (a, b) = tokio::join!(auth.hydrate(), auth.hydrate());
    assert_eq!(a, SessionStatus::Authenticated);
    assert_eq!(b, SessionStatus::Authenticated);
    assert_eq!(auth.user().unwrap().id, 1);
}

#[tokio::test]
async fn logout_during_refresh_is_not_undone() {
    let api = student_api();
    let auth = Arc::new(authority(&api, jar_with("acc-1", "ref-1")));
    auth.hydrate().await;
    let gate = gated(&api);
    api.state().me_calls = 0;

    let refreshing = tokio::spawn({
        let auth = auth.clone();
        async move { auth.refresh().await }
    });
    wait_for_me_call(&api).await;

    auth.logout().await;
    gate.notify_one();

    assert!(matches!(refreshing.await.unwrap(), Err(AuthError::Superseded)));
    assert_eq!(auth.status(), SessionStatus::Unauthenticated);
    assert!(auth.user().is_none());
}

#[tokio::test]
async fn refresh_rotates_expired_access_and_retries() {
    let api = student_api();
    let auth = authority(&api, jar_with("acc-1", "ref-1"));
    auth.hydrate().await;
    api.state().valid_access = Some("acc-0".into());

    // `refresh_token` hands out acc-2 and makes it the valid one.
    let u = auth.refresh().await.unwrap();
    assert_eq!(u.id, 1);
    assert_eq!(api.state().refresh_calls, 1);
    assert_eq!(auth.access_token().as_deref(), Some("acc-2"));
    assert_eq!(auth.session().access_token(), Some("acc-2"));
}
