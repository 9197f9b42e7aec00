//! Session store and session authority.
//!
//! ARCHITECTURE
//! ============
//! `SessionStore` is the cached `{user, tokens, hydration}` view plus its
//! durable blob. `SessionAuthority` owns one store and one token store for a
//! single client context and is the only thing that mutates them: hydration,
//! login, logout and refresh all go through it. There is no process-wide
//! singleton; each request (or client process) constructs its own authority
//! and hands it to whatever needs the session.
//!
//! CONCURRENCY
//! ===========
//! Local state sits behind a `std::sync::Mutex` that is never held across an
//! `.await`, so every local read/write is atomic with respect to the network
//! calls interleaved between them. Transitions bump an epoch; an operation that
//! awaited the network re-checks it after re-locking and drops its result if
//! a login or logout landed in between. Hydration must finish before guards make
//! redirect decisions; `status()` reports `Loading` until it has.
//!
//! ERROR HANDLING
//! ==============
//! Hydration and logout are best effort: remote failures are logged and the
//! local transition happens regardless. Login, refresh and token rotation
//! propagate errors to the caller.

#[cfg(test)]
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::api::{ApiError, User};
use super::auth::{AuthClient, AuthError};
use super::tokens::TokenStore;
use crate::config::DEFAULT_LOGOUT_TIMEOUT_SECS;

/// Key of the durable session blob.
pub const SESSION_STORAGE_KEY: &str = "auth-storage";

/// Upper bound on the remote half of `logout()`.
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_LOGOUT_TIMEOUT_SECS);

/// Where `logout()` sends the user.
pub const LOGOUT_REDIRECT: &str = "/login";

// =============================================================================
// DURABLE STORAGE
// =============================================================================

/// String blob storage keyed by name. Infallible by contract: backends that
/// cannot reach their medium return `None` and drop writes.
pub trait SessionStorage: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local storage shared by every authority built over the same `Arc`.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStorage {
    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) {
        self.items().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.items().remove(key);
    }
}

/// Storage for contexts with no durable medium (server-side requests).
pub struct DetachedStorage;

impl SessionStorage for DetachedStorage {
    fn load(&self, _key: &str) -> Option<String> {
        None
    }

    fn save(&self, _key: &str, _value: &str) {}

    fn remove(&self, _key: &str) {}
}

/// Shape of the durable blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

/// Cached session view. Fields are private so `is_authenticated` can only be
/// set together with a user and an access token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    is_authenticated: bool,
    has_hydrated: bool,
}

impl Session {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[cfg(test)]
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    #[must_use]
    pub fn has_hydrated(&self) -> bool {
        self.has_hydrated
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if !self.has_hydrated {
            SessionStatus::Loading
        } else if self.is_authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        }
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

pub struct SessionStore {
    session: Session,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { session: Session::default(), storage }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read the durable blob. Missing or malformed blobs read as `None`.
    #[must_use]
    pub fn read_persisted(&self) -> Option<PersistedSession> {
        let raw = self.storage.load(SESSION_STORAGE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(persisted) => Some(persisted),
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed persisted session");
                None
            }
        }
    }

    pub fn authenticate(&mut self, user: User, access_token: String, refresh_token: Option<String>) {
        self.session.user = Some(user);
        self.session.access_token = Some(access_token);
        self.session.refresh_token = refresh_token;
        self.session.is_authenticated = true;
        self.persist();
    }

    /// Refresh the cached token copy. Does not change authentication state.
    pub fn set_tokens(&mut self, access_token: String, refresh_token: String) {
        self.session.access_token = Some(access_token);
        self.session.refresh_token = Some(refresh_token);
        self.persist();
    }

    /// Reset to empty. `has_hydrated` is kept.
    pub fn clear(&mut self) {
        self.session = Session { has_hydrated: self.session.has_hydrated, ..Session::default() };
        self.storage.remove(SESSION_STORAGE_KEY);
    }

    pub fn mark_hydrated(&mut self) {
        self.session.has_hydrated = true;
    }

    fn persist(&self) {
        let blob = PersistedSession {
            user: self.session.user.clone(),
            is_authenticated: self.session.is_authenticated,
            access_token: self.session.access_token.clone(),
            refresh_token: self.session.refresh_token.clone(),
        };
        match serde_json::to_string(&blob) {
            Ok(raw) => self.storage.save(SESSION_STORAGE_KEY, &raw),
            Err(e) => tracing::warn!(error = %e, "failed to serialize session"),
        }
    }
}

// =============================================================================
// SESSION AUTHORITY
// =============================================================================

struct AuthorityState<T> {
    store: SessionStore,
    tokens: T,
    /// Bumped by every transition that replaces or clears the session. An
    /// operation that awaited the network only applies its result if the
    /// epoch it started under is still current.
    epoch: u64,
}

impl<T: TokenStore> AuthorityState<T> {
    /// Drop the cached session; cookies are kept.
    fn forget_session(&mut self) {
        self.store.clear();
        self.epoch += 1;
    }

    /// Drop the cached session and the cookies.
    fn sign_out(&mut self) {
        self.store.clear();
        self.tokens.clear_tokens();
        self.epoch += 1;
    }
}

/// Why hydration could not confirm a session.
enum HydrationFailure {
    NoToken,
    /// The API rejected the stored credentials; they are cleared.
    Rejected,
    /// Transport or server trouble; cookies are kept for the next attempt.
    Unavailable(AuthError),
}

struct Confirmed {
    user: User,
    access_token: String,
    refresh_token: Option<String>,
    rotated: bool,
}

pub struct SessionAuthority<T: TokenStore> {
    auth: AuthClient,
    state: Mutex<AuthorityState<T>>,
    logout_timeout: Duration,
}

impl<T: TokenStore> SessionAuthority<T> {
    #[must_use]
    pub fn new(auth: AuthClient, storage: Arc<dyn SessionStorage>, tokens: T) -> Self {
        Self {
            auth,
            state: Mutex::new(AuthorityState { store: SessionStore::new(storage), tokens, epoch: 0 }),
            logout_timeout: LOGOUT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, AuthorityState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current session.
    #[cfg(test)]
    #[must_use]
    pub fn session(&self) -> Session {
        self.lock().store.session().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock().store.session().status()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.lock().store.session().user().cloned()
    }

    /// Current access token, read from the token store.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock().tokens.access_token()
    }

    /// Consume the authority, returning the token store (and its pending writes).
    pub fn into_tokens(self) -> T {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner).tokens
    }

    /// Restore the session from durable storage and confirm it with the API.
    ///
    /// Runs once; later calls return the settled status. Never fails: any
    /// error degrades to `Unauthenticated`. If a login or logout lands while
    /// the API call is in flight, that transition wins and the hydration
    /// result is dropped.
    pub async fn hydrate(&self) -> SessionStatus {
        let (access, refresh, epoch) = {
            let st = self.lock();
            if st.store.session().has_hydrated() {
                return st.store.session().status();
            }
            let access = st.tokens.access_token();
            if let Some(persisted) = st.store.read_persisted() {
                if persisted.access_token.is_some() && persisted.access_token != access {
                    tracing::debug!("persisted token differs from cookie; cookie wins");
                }
            }
            (access, st.tokens.refresh_token(), st.epoch)
        };

        let outcome = match access {
            Some(access) => self.confirm(access, refresh).await,
            None => Err(HydrationFailure::NoToken),
        };

        let mut st = self.lock();
        if st.epoch != epoch || st.store.session().has_hydrated() {
            tracing::debug!("session changed during hydration; discarding result");
            return st.store.session().status();
        }
        match outcome {
            Ok(confirmed) => {
                if confirmed.rotated {
                    if let Some(refresh) = &confirmed.refresh_token {
                        st.tokens.set_tokens(&confirmed.access_token, refresh);
                    }
                }
                tracing::debug!(user_id = confirmed.user.id, role = confirmed.user.role.as_str(), "session hydrated");
                st.store
                    .authenticate(confirmed.user, confirmed.access_token, confirmed.refresh_token);
            }
            Err(HydrationFailure::NoToken) => st.forget_session(),
            Err(HydrationFailure::Rejected) => {
                tracing::debug!("stored credentials rejected; clearing session");
                st.sign_out();
            }
            Err(HydrationFailure::Unavailable(e)) => {
                tracing::warn!(error = %e, "could not confirm session; treating as signed out");
                st.forget_session();
            }
        }
        st.store.mark_hydrated();
        st.store.session().status()
    }

    /// `me()` with one refresh-and-retry on a rejected access token.
    async fn confirm(&self, access: String, refresh: Option<String>) -> Result<Confirmed, HydrationFailure> {
        match self.auth.me(&access).await {
            Ok(user) => return Ok(Confirmed { user, access_token: access, refresh_token: refresh, rotated: false }),
            Err(AuthError::Api(ApiError::Unauthorized)) => {}
            Err(e) => return Err(HydrationFailure::Unavailable(e)),
        }

        let Some(refresh) = refresh else {
            return Err(HydrationFailure::Rejected);
        };
        let pair = self
            .auth
            .refresh_with(&refresh)
            .await
            .map_err(classify_failure)?;
        let user = self
            .auth
            .me(&pair.access_token)
            .await
            .map_err(classify_failure)?;
        Ok(Confirmed { user, access_token: pair.access_token, refresh_token: Some(pair.refresh_token), rotated: true })
    }

    /// Sign in with phone + OTP code.
    ///
    /// # Errors
    ///
    /// Every validation and API failure propagates; local state is untouched
    /// on error. `Superseded` if a logout ran while the API call was in flight.
    pub async fn login(&self, phone: &str, code: &str) -> Result<User, AuthError> {
        let epoch = self.lock().epoch;
        let resp = self.auth.login(phone, code).await?;

        let mut st = self.lock();
        if st.epoch != epoch {
            return Err(AuthError::Superseded);
        }
        st.epoch += 1;
        st.tokens
            .set_tokens(&resp.tokens.access_token, &resp.tokens.refresh_token);
        st.store
            .authenticate(resp.user.clone(), resp.tokens.access_token, Some(resp.tokens.refresh_token));
        st.store.mark_hydrated();
        tracing::info!(user_id = resp.user.id, role = resp.user.role.as_str(), "login succeeded");
        Ok(resp.user)
    }

    /// Sign out. Local state is cleared first and unconditionally; the remote
    /// invalidation that follows is bounded by the logout timeout and its
    /// failures are only logged. Returns the redirect target.
    pub async fn logout(&self) -> &'static str {
        let token = {
            let mut st = self.lock();
            let token = st
                .tokens
                .access_token()
                .or_else(|| st.store.session().access_token().map(str::to_owned));
            st.sign_out();
            st.store.mark_hydrated();
            token
        };

        if let Some(token) = token {
            match tokio::time::timeout(self.logout_timeout, self.auth.logout(&token)).await {
                Ok(Ok(())) => tracing::debug!("remote logout succeeded"),
                Ok(Err(e)) => tracing::warn!(error = %e, "remote logout failed; local session already cleared"),
                Err(_) => tracing::warn!("remote logout timed out; local session already cleared"),
            }
        }
        LOGOUT_REDIRECT
    }

    /// Re-fetch the current user, rotating the token pair once if the access
    /// token has expired.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without an access token; API failures propagate and
    /// leave the session as it was. A changed role clears the session and
    /// returns `RoleChanged`. `Superseded` if a login or logout ran meanwhile.
    pub async fn refresh(&self) -> Result<User, AuthError> {
        let (mut access, epoch) = {
            let st = self.lock();
            (st.tokens.access_token().ok_or(AuthError::NotAuthenticated)?, st.epoch)
        };
        let user = match self.auth.me(&access).await {
            Ok(user) => user,
            Err(AuthError::Api(ApiError::Unauthorized)) => {
                self.refresh_tokens().await?;
                access = self.access_token().ok_or(AuthError::NotAuthenticated)?;
                self.auth.me(&access).await?
            }
            Err(e) => return Err(e),
        };

        let mut st = self.lock();
        if st.epoch != epoch {
            return Err(AuthError::Superseded);
        }
        let previous_role = st.store.session().user().map(|u| u.role);
        match previous_role {
            Some(role) if role != user.role => {
                tracing::warn!(user_id = user.id, from = role.as_str(), to = user.role.as_str(), "role changed mid-session");
                st.sign_out();
                return Err(AuthError::RoleChanged);
            }
            _ => {}
        }
        let refresh = st.tokens.refresh_token();
        st.store.authenticate(user.clone(), access, refresh);
        st.store.mark_hydrated();
        Ok(user)
    }

    /// Rotate the token pair; the token store is written first, then the
    /// session's cached copy.
    ///
    /// # Errors
    ///
    /// `MissingRefreshToken` or the API failure. `Superseded` if a login or
    /// logout ran meanwhile; the rotated pair is then discarded.
    pub async fn refresh_tokens(&self) -> Result<(), AuthError> {
        let (refresh, epoch) = {
            let st = self.lock();
            (st.tokens.refresh_token().ok_or(AuthError::MissingRefreshToken)?, st.epoch)
        };
        let pair = self.auth.refresh_with(&refresh).await?;

        let mut st = self.lock();
        if st.epoch != epoch {
            return Err(AuthError::Superseded);
        }
        st.tokens.set_tokens(&pair.access_token, &pair.refresh_token);
        st.store.set_tokens(pair.access_token, pair.refresh_token);
        Ok(())
    }
}

fn classify_failure(e: AuthError) -> HydrationFailure {
    match e {
        AuthError::Api(ApiError::Unauthorized) => HydrationFailure::Rejected,
        other => HydrationFailure::Unavailable(other),
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
