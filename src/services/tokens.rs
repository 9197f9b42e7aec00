//! Cookie-backed token storage.
//!
//! ARCHITECTURE
//! ============
//! The cookie jar is the authority for the access/refresh pair; the session
//! store only caches a copy. Reads come from the request's `Cookie` header,
//! writes accumulate in the jar and reach the browser as `Set-Cookie`
//! headers when the jar is returned with the response.
//!
//! TRADE-OFFS
//! ==========
//! The cookies are deliberately not HttpOnly so client script can read the
//! bearer token. Expiry is enforced by the browser; the store does no
//! signature or expiry validation and trusts the API to reject bad tokens.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "auth_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const ACCESS_TOKEN_MAX_AGE: Duration = Duration::days(1);
pub const REFRESH_TOKEN_MAX_AGE: Duration = Duration::days(7);

/// Durable storage of the token pair.
pub trait TokenStore: Send {
    fn set_tokens(&mut self, access: &str, refresh: &str);
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn clear_tokens(&mut self);

    /// True iff an access token is currently retrievable.
    fn has_valid_token(&self) -> bool {
        self.access_token().is_some()
    }
}

/// [`TokenStore`] over an `axum_extra` cookie jar.
///
/// A detached store has no request context: reads are `None`, writes are
/// dropped.
#[derive(Debug, Clone)]
pub struct CookieTokenStore {
    jar: Option<CookieJar>,
    secure: bool,
}

impl CookieTokenStore {
    #[must_use]
    pub fn new(jar: CookieJar, secure: bool) -> Self {
        Self { jar: Some(jar), secure }
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self::new(CookieJar::from_headers(headers), secure)
    }

    #[cfg(test)]
    #[must_use]
    pub fn detached() -> Self {
        Self { jar: None, secure: false }
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.jar.is_some()
    }

    /// Jar carrying every pending `Set-Cookie`; empty when detached.
    #[must_use]
    pub fn into_jar(self) -> CookieJar {
        self.jar.unwrap_or_default()
    }

    fn read(&self, name: &str) -> Option<String> {
        let cookie = self.jar.as_ref()?.get(name)?;
        let expired = cookie.max_age().is_some_and(|age| age <= Duration::ZERO);
        if expired || cookie.value().is_empty() {
            return None;
        }
        Some(cookie.value().to_owned())
    }

    fn write(&mut self, name: &'static str, value: String, max_age: Duration) {
        let Some(jar) = self.jar.take() else {
            return;
        };
        let cookie = Cookie::build((name, value))
            .path("/")
            .http_only(false)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(max_age);
        self.jar = Some(jar.add(cookie));
    }
}

impl TokenStore for CookieTokenStore {
    fn set_tokens(&mut self, access: &str, refresh: &str) {
        self.write(ACCESS_TOKEN_COOKIE, access.to_owned(), ACCESS_TOKEN_MAX_AGE);
        self.write(REFRESH_TOKEN_COOKIE, refresh.to_owned(), REFRESH_TOKEN_MAX_AGE);
    }

    fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_COOKIE)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_COOKIE)
    }

    fn clear_tokens(&mut self) {
        self.write(ACCESS_TOKEN_COOKIE, String::new(), Duration::ZERO);
        self.write(REFRESH_TOKEN_COOKIE, String::new(), Duration::ZERO);
    }
}

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tests;
