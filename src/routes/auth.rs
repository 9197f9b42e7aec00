//! Auth routes — OTP login, logout, session introspection, token rotation.
//!
//! Every request gets its own `SessionAuthority` over the request's cookies
//! (see [`RequestSession`]). Handlers that may touch tokens return the jar
//! with their response so rotations and clears reach the browser.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::json;

use crate::services::api::{ApiError, User};
use crate::services::auth::{AuthClient, AuthError};
use crate::services::guard::RoleGroup;
use crate::services::session::{DetachedStorage, SessionAuthority, SessionStatus};
use crate::services::tokens::CookieTokenStore;
use crate::state::AppState;
use crate::tenant::RequestOrigin;

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[must_use]
pub fn api_error_to_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Status { status, .. } => match StatusCode::from_u16(*status) {
            Ok(code) if code.is_client_error() => code,
            _ => StatusCode::BAD_GATEWAY,
        },
        ApiError::Request(_) | ApiError::Parse(_) => StatusCode::BAD_GATEWAY,
        ApiError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[must_use]
pub fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidPhone | AuthError::InvalidCode => StatusCode::BAD_REQUEST,
        AuthError::MissingRefreshToken | AuthError::NotAuthenticated | AuthError::RoleChanged => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::Superseded => StatusCode::CONFLICT,
        AuthError::Api(e) => api_error_to_status(e),
    }
}

pub(crate) fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

// =============================================================================
// SESSION EXTRACTOR
// =============================================================================

/// Per-request session context: the request's cookie-backed token store and
/// the auth client to build an authority over it.
pub struct RequestSession {
    pub tokens: CookieTokenStore,
    auth: AuthClient,
    logout_timeout: Duration,
}

impl RequestSession {
    #[must_use]
    pub fn from_headers(state: &AppState, headers: &HeaderMap) -> Self {
        let origin = RequestOrigin::from_headers(headers, state.config.default_scheme());
        let secure = state.cookie_secure(origin.as_ref());
        Self {
            tokens: CookieTokenStore::from_headers(headers, secure),
            auth: state.auth.clone(),
            logout_timeout: Duration::from_secs(state.config.logout_timeout_secs),
        }
    }

    /// Authority over this request's cookies. Not yet hydrated.
    #[must_use]
    pub fn authority(self) -> SessionAuthority<CookieTokenStore> {
        SessionAuthority::new(self.auth, Arc::new(DetachedStorage), self.tokens)
            .with_logout_timeout(self.logout_timeout)
    }
}

impl<S> axum::extract::FromRequestParts<S> for RequestSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(Self::from_headers(&app_state, &parts.headers))
    }
}

/// Hydrate and require a signed-in user whose role is in `group`.
/// Returns the user and the confirmed access token, or 401/403.
pub(crate) async fn authorize(
    authority: &SessionAuthority<CookieTokenStore>,
    group: RoleGroup,
) -> Result<(User, String), StatusCode> {
    if authority.hydrate().await != SessionStatus::Authenticated {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let (Some(user), Some(token)) = (authority.user(), authority.access_token()) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if !group.contains(user.role) {
        tracing::debug!(user_id = user.id, role = user.role.as_str(), "role not permitted");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok((user, token))
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct OtpRequest {
    phone: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    phone: String,
    code: String,
}

#[derive(Deserialize, Default)]
pub struct MeQuery {
    refresh: Option<String>,
}

impl MeQuery {
    fn wants_refresh(&self) -> bool {
        matches!(self.refresh.as_deref(), Some("1" | "true"))
    }
}

/// `POST /api/auth/otp` — text a one-time code to the phone.
pub async fn request_otp(State(state): State<AppState>, Json(body): Json<OtpRequest>) -> Response {
    match state.auth.request_otp(&body.phone).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "otp request failed");
            error_response(auth_error_to_status(&e), e)
        }
    }
}

/// `POST /api/auth/login` — exchange phone + code for a session, set cookies.
pub async fn login(session: RequestSession, Json(body): Json<LoginRequest>) -> Response {
    let authority = session.authority();
    match authority.login(&body.phone, &body.code).await {
        Ok(user) => (authority.into_tokens().into_jar(), Json(user)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "login failed");
            error_response(auth_error_to_status(&e), e)
        }
    }
}

/// `POST /api/auth/logout` — clear cookies, best-effort remote logout, 303 to login.
pub async fn logout(session: RequestSession) -> Response {
    let authority = session.authority();
    let target = authority.logout().await;
    (authority.into_tokens().into_jar(), Redirect::to(target)).into_response()
}

/// `GET /api/auth/me` — hydrated session status and user. With
/// `?refresh=1` the user is re-fetched so a role change is noticed.
pub async fn me(session: RequestSession, Query(query): Query<MeQuery>) -> Response {
    let authority = session.authority();
    let mut status = authority.hydrate().await;
    if query.wants_refresh() && status == SessionStatus::Authenticated {
        if let Err(e) = authority.refresh().await {
            tracing::debug!(error = %e, "session refresh failed");
            let jar = authority.into_tokens().into_jar();
            return (jar, error_response(auth_error_to_status(&e), e)).into_response();
        }
        status = authority.status();
    }
    let user = authority.user();
    (authority.into_tokens().into_jar(), Json(json!({ "status": status, "user": user }))).into_response()
}

/// `POST /api/auth/refresh` — rotate the token pair using the refresh cookie.
pub async fn refresh(State(state): State<AppState>, session: RequestSession) -> Response {
    let mut tokens = session.tokens;
    match state.auth.refresh_tokens(&mut tokens).await {
        Ok(_) => (tokens.into_jar(), StatusCode::NO_CONTENT).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "token refresh failed");
            error_response(auth_error_to_status(&e), e)
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
