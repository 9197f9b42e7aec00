//! Page routes — tenant landing, dashboard fan-out, guarded dashboard views
//! and teacher profiles at `/{username}`.
//!
//! Pages answer with JSON view descriptors (`{"view": ...}`); rendering
//! belongs to the frontend. Guard redirects are `303 See Other`.

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::json;

use super::auth::RequestSession;
use crate::edge::{self, PathClass};
use crate::services::api::Role;
use crate::services::guard::{GuardDecision, RoleGroup, RouteGuard};
use crate::state::AppState;
use crate::tenant::RequestOrigin;

#[derive(Deserialize)]
pub struct TenantQuery {
    tenant: Option<String>,
}

fn request_origin(state: &AppState, headers: &HeaderMap) -> RequestOrigin {
    RequestOrigin::from_headers(headers, state.config.default_scheme())
        .unwrap_or_else(|| RequestOrigin::new(state.config.default_scheme(), "localhost"))
}

fn tenant_param(uri: &Uri) -> Option<String> {
    Query::<TenantQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.tenant)
}

/// `GET /` — tenant home on a teacher host, main landing otherwise.
pub async fn landing(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let origin = request_origin(&state, &headers);
    let url = origin.url(uri.path_and_query().map_or("/", |pq| pq.as_str()));
    match state.tenants.resolve_url(&url) {
        Some(tenant) => Json(json!({
            "view": "tenant-home",
            "tenant": tenant,
            "loginUrl": state.tenants.build_main_app_url(&origin, &state.config.login_path),
        }))
        .into_response(),
        None => Json(json!({ "view": "landing" })).into_response(),
    }
}

/// `GET /login` — signed-in users go straight to their dashboard. Login
/// lives on the main app, so teacher hosts are sent there.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap, uri: Uri, session: RequestSession) -> Response {
    let origin = request_origin(&state, &headers);
    if state.tenants.is_teacher_subdomain(&origin.host, tenant_param(&uri).as_deref()) {
        return Redirect::to(&state.tenants.build_main_app_url(&origin, &state.config.login_path)).into_response();
    }

    let authority = session.authority();
    authority.hydrate().await;
    let user = authority.user();
    let jar = authority.into_tokens().into_jar();
    match user {
        Some(user) => (jar, Redirect::to(user.role.home_path())).into_response(),
        None => (jar, Json(json!({ "view": "login" }))).into_response(),
    }
}

/// `GET /dashboard` — redirect to the caller's role home, or to login.
pub async fn dashboard(State(state): State<AppState>, session: RequestSession) -> Response {
    let mut guard = RouteGuard::authenticated().with_login_path(state.config.login_path.as_str());
    let authority = session.authority();
    let status = authority.hydrate().await;
    let user = authority.user();
    let jar = authority.into_tokens().into_jar();
    match guard.evaluate(status, user.as_ref()) {
        GuardDecision::Redirect(path) => (jar, Redirect::to(&path)).into_response(),
        _ => {
            let target = user.map_or_else(|| state.config.login_path.clone(), |u| u.role.home_path().to_owned());
            (jar, Redirect::to(&target)).into_response()
        }
    }
}

async fn guarded_view(state: &AppState, session: RequestSession, guard: RouteGuard, view: &str) -> Response {
    let mut guard = guard
        .with_login_path(state.config.login_path.as_str())
        .with_fallback_path(state.config.fallback_path.as_str());
    let authority = session.authority();
    let status = authority.hydrate().await;
    let user = authority.user();
    let decision = guard.evaluate(status, user.as_ref());
    let jar = authority.into_tokens().into_jar();

    match decision {
        GuardDecision::Render => (jar, Json(json!({ "view": view, "user": user }))).into_response(),
        GuardDecision::Redirect(path) => (jar, Redirect::to(&path)).into_response(),
        GuardDecision::Loading => (jar, Json(json!({ "view": "loading" }))).into_response(),
        GuardDecision::Hold => (jar, StatusCode::FORBIDDEN).into_response(),
    }
}

/// `GET /student`
pub async fn student_home(State(state): State<AppState>, session: RequestSession) -> Response {
    guarded_view(&state, session, RouteGuard::roles(RoleGroup::Only(Role::Student)), "student-dashboard").await
}

/// `GET /teacher`
pub async fn teacher_home(State(state): State<AppState>, session: RequestSession) -> Response {
    guarded_view(&state, session, RouteGuard::teacher_or_above(), "teacher-dashboard").await
}

/// `GET /admin`
pub async fn admin_home(State(state): State<AppState>, session: RequestSession) -> Response {
    guarded_view(&state, session, RouteGuard::moderator_or_above(), "admin-dashboard").await
}

/// `GET /admin/settings`
pub async fn admin_settings(State(state): State<AppState>, session: RequestSession) -> Response {
    guarded_view(&state, session, RouteGuard::admin_only(), "admin-settings").await
}

/// `GET /{segment}` — public teacher profile for username candidates. Only
/// the main app serves profiles; a teacher host has no `/{username}` pages.
pub async fn profile(State(state): State<AppState>, req: Request) -> Response {
    let class = req
        .extensions()
        .get::<PathClass>()
        .cloned()
        .unwrap_or_else(|| edge::classify_path(req.uri().path()));
    let Some(username) = class.username() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let origin = request_origin(&state, req.headers());
    if !state.tenants.is_main_app(&origin.host, tenant_param(req.uri()).as_deref()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "view": "teacher-profile",
        "username": username,
        "tenantUrl": state.tenants.build_teacher_url(&origin, username, "/"),
    }))
    .into_response()
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
