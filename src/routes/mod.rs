//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! API routes under `/api` proxy to the platform API behind CORS; page
//! routes return view descriptors. The edge classifier wraps the whole
//! router so `/{segment}` sees the username decision, and static routes
//! win over the catch-all segment.

pub mod auth;
pub mod pages;
pub mod settings;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::edge;
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/otp", post(auth::request_otp))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/refresh", post(auth::refresh))
        .route(
            "/api/settings/platform",
            get(settings::get_platform).put(settings::put_platform),
        )
        .route(
            "/api/settings/teachers/{id}",
            get(settings::get_teacher).put(settings::put_teacher),
        )
        .route("/api/teachers", get(settings::list_teachers))
        .layer(cors)
}

fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::landing))
        .route("/login", get(pages::login_page))
        .route("/dashboard", get(pages::dashboard))
        .route("/student", get(pages::student_home))
        .route("/teacher", get(pages::teacher_home))
        .route("/admin", get(pages::admin_home))
        .route("/admin/settings", get(pages::admin_settings))
        .route("/{segment}", get(pages::profile))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .merge(page_routes())
        .route("/healthz", get(healthz))
        .layer(axum::middleware::from_fn(edge::classify_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
